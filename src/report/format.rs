//! Formatted terminal output for sessions, runs and the interest-rate plane.
//!
//! All formatting lives here so the simulation code stays free of
//! presentation concerns.

use crate::agents::RateAdjustment;
use crate::domain::{RateRange, SimConfig};
use crate::market::{InterestRatePlane, Market};
use crate::report::chart::{Series, render_histogram, render_series};
use crate::sim::RunOutput;

const MARKERS: [char; 6] = ['*', 'o', '+', 'x', '#', '@'];

/// Per-group, per-bank and histogram summary of a finished run.
pub fn format_run_summary(output: &RunOutput, market: &Market) -> String {
    let mut out = String::new();

    out.push_str("=== cmsim - credit market simulation ===\n");
    out.push_str(&format!("Policy: {}\n", market.policy.display_name()));
    out.push_str(&format!(
        "Steps: {} | score=[{}, {}] | repay={:+} default={:+}\n",
        output.market.step, market.score_range.min, market.score_range.max, market.repay_score, market.default_score,
    ));

    out.push_str("\nGroups:\n");
    out.push_str(
        format!(
            "{:<16} {:>6} {:>8} {:>12} {:>10} {:>10}\n",
            "group", "size", "loans", "utility", "util/loan", "mean d"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(rule(&[16, 6, 8, 12, 10, 10]).trim_end());
    out.push('\n');
    for group in &output.groups {
        let name = group.name.as_str();
        let loans = output.market.loans.get(name).and_then(|s| s.last()).copied().unwrap_or(0);
        let utility = output.market.utility.get(name).and_then(|s| s.last()).copied().unwrap_or(0.0);
        let change = output
            .mean_score_change
            .get(name)
            .and_then(|s| s.last())
            .copied()
            .unwrap_or(0.0);
        out.push_str(
            format!(
                "{:<16} {:>6} {:>8} {:>12.3} {:>10} {:>+10.2}\n",
                truncate(name, 16),
                group.size(),
                loans,
                utility,
                fmt_opt(output.utility_per_loan(name)),
                change,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!(
        "Total: loans={} utility={:.3}\n",
        output.total_loans(),
        output.total_utility()
    ));

    out.push_str("\nBanks:\n");
    out.push_str(
        format!(
            "{:<16} {:>7} {:>8} {:>12} {:>9} {:>9} {:<8}\n",
            "bank", "share", "loans", "utility", "rate@min", "rate@max", "last"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(rule(&[16, 7, 8, 12, 9, 9, 8]).trim_end());
    out.push('\n');
    let last_step = output.steps.last();
    for bank in &output.banks {
        let loans: usize = bank.n_loan_curves.values().filter_map(|s| s.last()).sum();
        let utility: f64 = bank.total_utility_curves.values().filter_map(|s| s.last()).sum();
        let rates = bank.interest_rate_range();
        let last = last_step
            .and_then(|s| s.banks.iter().find(|b| b.name == bank.name))
            .map(|b| fmt_adjustment(b.adjustment))
            .unwrap_or("-");
        out.push_str(
            format!(
                "{:<16} {:>6.1}% {:>8} {:>12.3} {:>9.4} {:>9.4} {:<8}\n",
                truncate(&bank.name, 16),
                bank.market_share * 100.0,
                loans,
                utility,
                rates.low_score,
                rates.high_score,
                last,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if let Some(step) = last_step {
        out.push_str(&format!("\nScore histograms (step {}):\n", step.step));
        for group in &step.groups {
            out.push_str(&render_histogram(&group.name, &group.score_histogram, 40));
        }
    }

    out
}

/// Mean score change per group over the run, as an ASCII chart.
pub fn format_mean_score_chart(output: &RunOutput, width: usize, height: usize) -> String {
    let series: Vec<Series> = output
        .groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let values = output.mean_score_change.get(&group.name).cloned().unwrap_or_default();
            Series::new(group.name.clone(), MARKERS[i % MARKERS.len()], values)
        })
        .collect();
    render_series("Mean score change", &series, width, height)
}

/// Human-readable view of a stored session.
pub fn format_config(session: &str, config: &SimConfig) -> String {
    let m = &config.market;
    let mut out = String::new();
    out.push_str(&format!("Session: {session}\n"));
    out.push_str(&format!("Policy: {}\n", m.policy.display_name()));
    out.push_str(&format!(
        "Score range: [{}, {}] | repay={:+} default={:+}\n",
        m.score_range.min, m.score_range.max, m.repay_score, m.default_score
    ));
    out.push_str(&format!(
        "Rate bounds: min={} max={}\n",
        fmt_range(m.min_interest_rate_range),
        fmt_range(m.max_interest_rate_range)
    ));
    out.push_str(&format!(
        "Plane: [{}, {}] step {}\n",
        m.plane_range[0], m.plane_range[1], m.plane_slice_step
    ));

    out.push_str("\nBanks:\n");
    for b in &config.banks {
        out.push_str(&format!(
            "- {}: rates={} shift={:+} utility={:+}/{:+} change={:+}/{:+}\n",
            b.name,
            fmt_range(b.interest_rate_range),
            b.score_shift,
            b.utility_repaid,
            b.utility_default,
            b.interest_change_up,
            b.interest_change_down,
        ));
    }

    out.push_str("\nGroups:\n");
    for g in &config.groups {
        let size = g.size.map(|n| n.to_string()).unwrap_or_else(|| "reference".to_string());
        out.push_str(&format!(
            "- {}: size={size} demand={} error_rate={} score_error={:+} rate_limit={}\n",
            g.name, g.loan_demand, g.error_rate, g.score_error, g.interest_rate_limit,
        ));
    }

    out
}

/// Plane overview, or the full rate table of one slice when `tightness` is set.
pub fn format_plane(plane: &InterestRatePlane, market: &Market, tightness: Option<f64>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Interest-rate plane: {} slices over [{}, {}]\n",
        plane.len(),
        market.plane_range[0],
        market.plane_range[1]
    ));

    let Some(t) = tightness else {
        out.push_str(format!("{:>9} {:>9} {:>9}\n", "tightness", "rate@min", "rate@max").trim_end());
        out.push('\n');
        let stride = (plane.len() / 10).max(1);
        for (i, slice) in plane.slices.iter().enumerate() {
            if i % stride != 0 && i + 1 != plane.len() {
                continue;
            }
            out.push_str(&format!(
                "{:>9.4} {:>9.5} {:>9.5}\n",
                slice.tightness, slice.anchors.low_score, slice.anchors.high_score
            ));
        }
        return out;
    };

    let Some(slice) = plane.slice(t) else {
        out.push_str("(empty plane)\n");
        return out;
    };
    out.push_str(&format!(
        "Slice t={:.4}: anchors {}\n",
        slice.tightness,
        fmt_range(slice.anchors)
    ));
    out.push_str(format!("{:>6} {:>9}\n", "score", "rate").trim_end());
    out.push('\n');
    let range = market.score_range;
    for score in range.scores().step_by(50) {
        out.push_str(&format!("{score:>6} {:>9.5}\n", slice.mapping.rate(score)));
    }
    if (range.max - range.min) % 50 != 0 {
        out.push_str(&format!("{:>6} {:>9.5}\n", range.max, slice.mapping.rate(range.max)));
    }
    out
}

fn fmt_adjustment(adjustment: Option<RateAdjustment>) -> &'static str {
    match adjustment {
        Some(RateAdjustment::Applied(_)) => "moved",
        Some(RateAdjustment::Blocked) => "blocked",
        None => "hold",
    }
}

fn fmt_range(r: RateRange) -> String {
    format!("{:.4}->{:.4}", r.low_score, r.high_score)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "-".to_string())
}

fn rule(widths: &[usize]) -> String {
    let parts: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    parts.join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
