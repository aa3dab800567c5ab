//! Step orchestration.
//!
//! A step has three phases, run in order over banks and groups in their
//! configured order:
//!
//! 1. before: the market's policy sets every bank's per-group selection rate
//! 2. during: each group samples its loan seekers, every seeker takes the
//!    cheapest eligible offer, outcomes resolve and scores move
//! 3. after: the step counter advances, banks compute market share and move
//!    their pricing, the market appends to its series
//!
//! State is checkpointed before each step. A fatal error in any phase puts
//! everything back, so a failed step leaves no trace.

use std::collections::HashMap;

use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agents::{ApplicantGroup, Bank, RateAdjustment};
use crate::data::GroupStatistics;
use crate::domain::SimConfig;
use crate::error::{SimError, StepPhase};
use crate::market::{Market, SelectionRates};
use crate::math::curve_max;
use crate::sim::{BankStepRecord, GroupStepRecord, MarketSeries, RunOutput, StepRecord};

/// Histogram bins used in step records unless overridden.
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

pub struct Simulation<R = StdRng> {
    market: Market,
    banks: Vec<Bank>,
    groups: Vec<ApplicantGroup>,
    rng: R,
    mean_score_change: HashMap<String, Vec<f64>>,
    records: Vec<StepRecord>,
    histogram_bins: usize,
}

struct Checkpoint<R> {
    market: Market,
    banks: Vec<Bank>,
    groups: Vec<ApplicantGroup>,
    rng: R,
    mean_score_change: HashMap<String, Vec<f64>>,
}

/// Working tallies for the during phase, indexed `[bank][group]`.
struct StepTally {
    seekers: Vec<usize>,
    loans: Vec<Vec<usize>>,
    utility: Vec<Vec<f64>>,
    curves: Vec<Vec<Vec<f64>>>,
}

impl StepTally {
    fn new(banks: usize, groups: usize) -> Self {
        Self {
            seekers: vec![0; groups],
            loans: vec![vec![0; groups]; banks],
            utility: vec![vec![0.0; groups]; banks],
            curves: vec![vec![Vec::new(); groups]; banks],
        }
    }

    fn group_loans(&self, g: usize) -> usize {
        self.loans.iter().map(|row| row[g]).sum()
    }

    fn group_utility(&self, g: usize) -> f64 {
        self.utility.iter().map(|row| row[g]).sum()
    }
}

impl Simulation<StdRng> {
    pub fn from_seed(config: &SimConfig, stats: &GroupStatistics, seed: u64) -> Result<Self, SimError> {
        Self::new(config, stats, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Clone> Simulation<R> {
    /// Validate `config`, reconstruct every group and initialise the series.
    ///
    /// Real-score seeding draws from `rng`, so the same seed gives the same
    /// starting population.
    pub fn new(config: &SimConfig, stats: &GroupStatistics, mut rng: R) -> Result<Self, SimError> {
        config.validate()?;
        let mut market = Market::new(&config.market)?;
        let banks: Vec<Bank> = config
            .banks
            .iter()
            .map(|p| Bank::new(p, market.score_range))
            .collect();
        let groups = config
            .groups
            .iter()
            .map(|p| ApplicantGroup::from_statistics(p, stats, market.score_range, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;

        market.init_series(&banks, &groups);
        let mean_score_change = groups.iter().map(|g| (g.name.clone(), vec![0.0])).collect();

        info!(
            "simulation ready: {} policy, {} banks, {} groups ({} applicants)",
            market.policy.display_name(),
            banks.len(),
            groups.len(),
            groups.iter().map(ApplicantGroup::size).sum::<usize>()
        );

        Ok(Self {
            market,
            banks,
            groups,
            rng,
            mean_score_change,
            records: Vec::new(),
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        })
    }

    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins.max(1);
        self
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Mutable market access between steps, e.g. to switch policy.
    pub fn market_mut(&mut self) -> &mut Market {
        &mut self.market
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    /// Mutable bank access between steps, e.g. to apply a plane slice.
    pub fn banks_mut(&mut self) -> &mut [Bank] {
        &mut self.banks
    }

    pub fn groups(&self) -> &[ApplicantGroup] {
        &self.groups
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn mean_score_change(&self) -> &HashMap<String, Vec<f64>> {
        &self.mean_score_change
    }

    pub fn step_count(&self) -> u64 {
        self.market.step
    }

    /// Run `steps` steps, continuing from wherever the last call stopped.
    pub fn run(&mut self, steps: u64) -> Result<RunOutput, SimError> {
        self.run_until(steps, |_| false)
    }

    /// Like [`Simulation::run`], but checks `stop` before each step and ends
    /// early once it returns true.
    pub fn run_until<F>(&mut self, steps: u64, mut stop: F) -> Result<RunOutput, SimError>
    where
        F: FnMut(&Self) -> bool,
    {
        info!("running {steps} steps from step {}", self.market.step);
        for _ in 0..steps {
            if stop(self) {
                info!("stop condition met at step {}", self.market.step);
                break;
            }
            self.step()?;
        }
        info!("run finished at step {}", self.market.step);
        Ok(self.output())
    }

    /// Run one step. On error the simulation is exactly as it was before.
    pub fn step(&mut self) -> Result<&StepRecord, SimError> {
        let checkpoint = self.checkpoint();
        match self.advance() {
            Ok(record) => {
                self.records.push(record);
                Ok(&self.records[self.records.len() - 1])
            }
            Err(err) => {
                self.restore(checkpoint);
                Err(err)
            }
        }
    }

    /// Snapshot of the current state as run output.
    pub fn output(&self) -> RunOutput {
        RunOutput {
            banks: self.banks.clone(),
            groups: self.groups.clone(),
            mean_score_change: self.mean_score_change.clone(),
            steps: self.records.clone(),
            market: MarketSeries {
                policy: self.market.policy,
                step: self.market.step,
                loans: self.market.loans.clone(),
                utility: self.market.utility.clone(),
                max_irates: self.market.max_irates.clone(),
                min_irates: self.market.min_irates.clone(),
            },
        }
    }

    fn checkpoint(&self) -> Checkpoint<R> {
        Checkpoint {
            market: self.market.clone(),
            banks: self.banks.clone(),
            groups: self.groups.clone(),
            rng: self.rng.clone(),
            mean_score_change: self.mean_score_change.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<R>) {
        self.market = checkpoint.market;
        self.banks = checkpoint.banks;
        self.groups = checkpoint.groups;
        self.rng = checkpoint.rng;
        self.mean_score_change = checkpoint.mean_score_change;
    }

    fn advance(&mut self) -> Result<StepRecord, SimError> {
        let step = self.market.step;
        info!("step {} -> {}", step, step + 1);
        let selection = self.before().map_err(|e| e.at_step(step, StepPhase::Before))?;
        let tally = self.during().map_err(|e| e.at_step(step, StepPhase::During))?;
        self.after(&selection, tally).map_err(|e| e.at_step(step, StepPhase::After))
    }

    fn before(&mut self) -> Result<SelectionRates, SimError> {
        let selection = self
            .market
            .selection_rates(&mut self.banks, &mut self.groups, &mut self.rng)?;
        for bank in &mut self.banks {
            if let Some(rates) = selection.rates.get(&bank.name) {
                bank.set_selection_rates(rates);
            }
        }
        Ok(selection)
    }

    fn during(&mut self) -> Result<StepTally, SimError> {
        let dynamics = self.market.dynamics();
        let mut tally = StepTally::new(self.banks.len(), self.groups.len());

        for (g, group) in self.groups.iter_mut().enumerate() {
            if group.size() == 0 {
                return Err(SimError::empty(format!("group '{}' has no applicants", group.name)));
            }
            let seekers = group.sample_loan_seekers(&mut self.rng);
            tally.seekers[g] = seekers.len();
            let size = group.size() as f64;

            for j in seekers {
                let applicant = &group.applicants()[j];
                let position = j as f64 / size;
                let mut best: Option<(usize, f64)> = None;
                for (k, bank) in self.banks.iter().enumerate() {
                    let Some(limit) = bank.selection_rate(&group.name) else {
                        continue;
                    };
                    if position > limit {
                        continue;
                    }
                    let quoted = bank.score_to_rate(bank.expected_score(dynamics.range, applicant.score()));
                    if quoted < applicant.ir_limit() && best.is_none_or(|(_, r)| quoted < r) {
                        best = Some((k, quoted));
                    }
                }

                let Some((k, quoted)) = best else {
                    trace!("{} #{j}: no eligible offer", group.name);
                    continue;
                };

                let outcome = group.resolve_loan(j, dynamics, &mut self.rng);
                let bank = &self.banks[k];
                let rate = bank.score_to_rate(group.applicants()[j].score());
                let utility = bank.realized_utility(rate, outcome);
                trace!(
                    "{} #{j}: loan from {} at {quoted:.4}, {outcome:?}, utility {utility:.4}",
                    group.name,
                    bank.name
                );

                tally.loans[k][g] += 1;
                tally.utility[k][g] += utility;
                let running = tally.utility[k][g];
                tally.curves[k][g].push(running);
            }

            for (k, bank) in self.banks.iter_mut().enumerate() {
                bank.accumulate(&group.name, tally.loans[k][g], tally.utility[k][g]);
            }
            group.sort_by_score();
            let change = group.mean_score_change();
            self.mean_score_change.entry(group.name.clone()).or_default().push(change);
            debug!("group {}: mean score change {change:+.3}", group.name);
        }

        Ok(tally)
    }

    fn after(&mut self, selection: &SelectionRates, mut tally: StepTally) -> Result<StepRecord, SimError> {
        self.market.step += 1;
        let n_banks = self.banks.len() as f64;
        let mut bank_records = Vec::with_capacity(self.banks.len());

        for (k, bank) in self.banks.iter_mut().enumerate() {
            let mut bank_clients = 0usize;
            let mut total_clients = 0.0;
            let mut max_expected = 0.0;
            let mut realized = 0.0;

            for (g, group) in self.groups.iter().enumerate() {
                let curve = std::mem::take(&mut tally.curves[k][g]);
                total_clients +=
                    group.size() as f64 * group.loan_demand() * bank.selection_rate(&group.name).unwrap_or(0.0);
                bank_clients += curve.len();
                let expected = bank
                    .expected_group_utility_curve
                    .get(&group.name)
                    .and_then(|c| curve_max(c))
                    .ok_or_else(|| {
                        SimError::empty(format!("bank '{}' has no utility curve for '{}'", bank.name, group.name))
                    })?;
                max_expected += expected * group.loan_demand();
                if let Some(&last) = curve.last() {
                    realized += last;
                }
                bank.real_group_utility_curve.insert(group.name.clone(), curve);
            }

            bank.market_share = if total_clients > 0.0 {
                bank_clients as f64 / total_clients
            } else {
                0.0
            };

            let fair_share = 1.0 / n_banks;
            let adjustment = if bank.market_share >= fair_share && realized >= max_expected / n_banks {
                Some(bank.adjust_interest_rate(bank.interest_change_up, &self.market))
            } else if bank.market_share < fair_share {
                Some(bank.adjust_interest_rate(bank.interest_change_down, &self.market))
            } else {
                None
            };
            debug!(
                "bank {}: market share {:.3}, rates {:?} ({})",
                bank.name,
                bank.market_share,
                bank.interest_rate_range(),
                match adjustment {
                    Some(RateAdjustment::Applied(_)) => "moved",
                    Some(RateAdjustment::Blocked) => "blocked",
                    None => "held",
                }
            );
            self.market.record_rates(bank);

            bank_records.push(BankStepRecord {
                name: bank.name.clone(),
                selection_rates: bank.group_selection_rate.clone(),
                loans: bank_clients,
                market_share: bank.market_share,
                realized_utility: realized,
                max_expected_utility: selection.max_utility.get(&bank.name).copied().unwrap_or(max_expected),
                adjustment,
                interest_rate_range: bank.interest_rate_range(),
            });
        }

        let mut group_records = Vec::with_capacity(self.groups.len());
        for (g, group) in self.groups.iter().enumerate() {
            let loans = tally.group_loans(g);
            let utility = tally.group_utility(g);
            self.market.record_group(&group.name, loans, utility);
            group_records.push(GroupStepRecord {
                name: group.name.clone(),
                loan_seekers: tally.seekers[g],
                loans,
                utility,
                mean_score_change: group.mean_score_change(),
                score_histogram: group.score_histogram(self.histogram_bins),
                real_score_histogram: group.real_score_histogram(self.histogram_bins),
            });
        }

        Ok(StepRecord {
            step: self.market.step,
            groups: group_records,
            banks: bank_records,
        })
    }
}
