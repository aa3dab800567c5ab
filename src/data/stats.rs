//! Empirical group statistics and the providers that supply them.
//!
//! The simulation needs, per applicant group:
//!
//! - a cumulative score distribution over a discrete score support
//! - a repay-probability-vs-score curve
//! - a reference population size
//!
//! Providers implement [`StatisticsSource`]. [`CsvStatistics`] reads a
//! directory of CSV exports; `data::synthetic` generates a seeded stand-in.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, SimError};

const CDF_FILE: &str = "cdf.csv";
const PERFORMANCE_FILE: &str = "performance.csv";
const TOTALS_FILE: &str = "totals.csv";

/// A function sampled on an ascending score grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurve {
    pub scores: Vec<f64>,
    pub values: Vec<f64>,
}

impl ScoreCurve {
    pub fn new(scores: Vec<f64>, values: Vec<f64>) -> Self {
        Self { scores, values }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Common shape checks: non-empty, equal lengths, strictly ascending finite grid.
    fn check_grid(&self, what: &str) -> Result<(), SimError> {
        if self.scores.is_empty() {
            return Err(SimError::invalid(format!("{what}: empty score support")));
        }
        if self.scores.len() != self.values.len() {
            return Err(SimError::invalid(format!(
                "{what}: {} scores but {} values",
                self.scores.len(),
                self.values.len()
            )));
        }
        if self.scores.iter().any(|s| !s.is_finite()) || self.values.iter().any(|v| !v.is_finite()) {
            return Err(SimError::invalid(format!("{what}: non-finite entry")));
        }
        if self.scores.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::invalid(format!("{what}: score support must be strictly ascending")));
        }
        Ok(())
    }

    /// Validate as a cumulative distribution: values in `[0, 1]`, non-decreasing.
    pub fn validate_cdf(&self, what: &str) -> Result<(), SimError> {
        self.check_grid(what)?;
        if self.values.iter().any(|v| !(0.0..=1.0 + 1e-9).contains(v)) {
            return Err(SimError::invalid(format!("{what}: CDF values must lie in [0, 1]")));
        }
        if self.values.windows(2).any(|w| w[1] < w[0] - 1e-12) {
            return Err(SimError::invalid(format!("{what}: CDF must be non-decreasing")));
        }
        Ok(())
    }

    /// Validate as a probability curve: values in `[0, 1]`.
    pub fn validate_probability(&self, what: &str) -> Result<(), SimError> {
        self.check_grid(what)?;
        if self.values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(SimError::invalid(format!("{what}: probabilities must lie in [0, 1]")));
        }
        Ok(())
    }
}

/// Everything the statistics provider supplies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub cdf_by_group: HashMap<String, ScoreCurve>,
    pub repay_curve_by_group: HashMap<String, ScoreCurve>,
    pub population_by_group: HashMap<String, usize>,
}

impl GroupStatistics {
    pub fn insert_group(&mut self, name: impl Into<String>, cdf: ScoreCurve, repay: ScoreCurve, population: usize) {
        let name = name.into();
        self.cdf_by_group.insert(name.clone(), cdf);
        self.repay_curve_by_group.insert(name.clone(), repay);
        self.population_by_group.insert(name, population);
    }

    /// Look up the three inputs for one group.
    pub fn group(&self, name: &str) -> Result<(&ScoreCurve, &ScoreCurve, Option<usize>), SimError> {
        let cdf = self
            .cdf_by_group
            .get(name)
            .ok_or_else(|| SimError::invalid(format!("no score distribution for group '{name}'")))?;
        let repay = self
            .repay_curve_by_group
            .get(name)
            .ok_or_else(|| SimError::invalid(format!("no repay curve for group '{name}'")))?;
        let population = self.population_by_group.get(name).copied();
        Ok((cdf, repay, population))
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cdf_by_group.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Source of empirical statistics.
pub trait StatisticsSource {
    fn load_group_statistics(&self) -> Result<GroupStatistics, AppError>;
}

impl StatisticsSource for GroupStatistics {
    fn load_group_statistics(&self) -> Result<GroupStatistics, AppError> {
        Ok(self.clone())
    }
}

/// Reads `cdf.csv`, `performance.csv` and `totals.csv` from a directory.
///
/// `cdf.csv` and `performance.csv` have a `score` column followed by one column
/// per group. A column whose values exceed `1.0` anywhere is read as percent.
/// `totals.csv` has `group,total` rows.
#[derive(Debug, Clone)]
pub struct CsvStatistics {
    pub dir: PathBuf,
}

impl CsvStatistics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl StatisticsSource for CsvStatistics {
    fn load_group_statistics(&self) -> Result<GroupStatistics, AppError> {
        let cdf_by_group = read_score_table(&self.dir.join(CDF_FILE))?;
        let repay_curve_by_group = read_score_table(&self.dir.join(PERFORMANCE_FILE))?;
        let population_by_group = read_totals(&self.dir.join(TOTALS_FILE))?;

        for name in cdf_by_group.keys() {
            if !repay_curve_by_group.contains_key(name) {
                return Err(AppError::data(format!(
                    "Group '{name}' has a CDF column but no performance column."
                )));
            }
        }

        Ok(GroupStatistics {
            cdf_by_group,
            repay_curve_by_group,
            population_by_group,
        })
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::data(format!("Failed to open CSV '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn read_score_table(path: &Path) -> Result<HashMap<String, ScoreCurve>, AppError> {
    let mut reader = open_reader(path)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::data(format!("Failed to read headers of '{}': {e}", path.display())))?
        .iter()
        .map(normalize_header_name)
        .collect();

    if headers.len() < 2 || !headers[0].eq_ignore_ascii_case("score") {
        return Err(AppError::data(format!(
            "'{}' must start with a `score` column followed by group columns.",
            path.display()
        )));
    }

    let mut scores = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len() - 1];

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result
            .map_err(|e| AppError::data(format!("{}:{line}: CSV parse error: {e}", path.display())))?;
        let row = parse_row(&record, headers.len())
            .map_err(|msg| AppError::data(format!("{}:{line}: {msg}", path.display())))?;
        scores.push(row[0]);
        for (col, value) in columns.iter_mut().zip(&row[1..]) {
            col.push(*value);
        }
    }

    if scores.is_empty() {
        return Err(AppError::data(format!("'{}' has no data rows.", path.display())));
    }

    let mut out = HashMap::new();
    for (name, mut values) in headers[1..].iter().cloned().zip(columns) {
        if values.iter().any(|&v| v > 1.0) {
            for v in &mut values {
                *v /= 100.0;
            }
        }
        out.insert(name, ScoreCurve::new(scores.clone(), values));
    }
    Ok(out)
}

fn parse_row(record: &StringRecord, width: usize) -> Result<Vec<f64>, String> {
    if record.len() < width {
        return Err(format!("expected {width} fields, found {}", record.len()));
    }
    record
        .iter()
        .take(width)
        .map(|s| s.parse::<f64>().map_err(|_| format!("invalid number '{s}'")))
        .collect()
}

fn read_totals(path: &Path) -> Result<HashMap<String, usize>, AppError> {
    let mut reader = open_reader(path)?;
    let mut out = HashMap::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result
            .map_err(|e| AppError::data(format!("{}:{line}: CSV parse error: {e}", path.display())))?;
        let (Some(name), Some(total)) = (record.get(0), record.get(1)) else {
            return Err(AppError::data(format!("{}:{line}: expected `group,total`", path.display())));
        };
        let total: f64 = total
            .parse()
            .map_err(|_| AppError::data(format!("{}:{line}: invalid total '{total}'", path.display())))?;
        if !(total.is_finite() && total >= 0.0) {
            return Err(AppError::data(format!("{}:{line}: total must be >= 0", path.display())));
        }
        if total.fract() != 0.0 {
            warn!("{}:{line}: fractional total {total} for '{name}' truncated", path.display());
        }
        out.insert(normalize_header_name(name), total as usize);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cmsim-stats-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, body: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn reads_percent_and_fraction_columns() {
        let dir = scratch_dir("read");
        write(&dir, CDF_FILE, "score,A,B\n300,10,0.2\n500,60,0.7\n850,100,1.0\n");
        write(&dir, PERFORMANCE_FILE, "Score,A,B\n300,5,0.1\n850,95,0.9\n");
        write(&dir, TOTALS_FILE, "group,total\nA,1000\nB,250\n");

        let stats = CsvStatistics::new(&dir).load_group_statistics().unwrap();
        let (cdf_a, repay_a, pop_a) = stats.group("A").unwrap();
        assert_eq!(cdf_a.values, vec![0.1, 0.6, 1.0]);
        assert_eq!(repay_a.values, vec![0.05, 0.95]);
        assert_eq!(pop_a, Some(1000));

        let (cdf_b, _, pop_b) = stats.group("B").unwrap();
        assert_eq!(cdf_b.values, vec![0.2, 0.7, 1.0]);
        assert_eq!(pop_b, Some(250));
        cdf_a.validate_cdf("A").unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_performance_column_is_a_data_error() {
        let dir = scratch_dir("missing");
        write(&dir, CDF_FILE, "score,A\n300,0.5\n850,1\n");
        write(&dir, PERFORMANCE_FILE, "score,B\n300,0.5\n850,1\n");
        write(&dir, TOTALS_FILE, "group,total\nA,10\n");

        let err = CsvStatistics::new(&dir).load_group_statistics().unwrap_err();
        assert_eq!(err.exit_code(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn cdf_validation_catches_decreasing_values() {
        let curve = ScoreCurve::new(vec![1.0, 2.0, 3.0], vec![0.2, 0.1, 1.0]);
        assert!(curve.validate_cdf("x").is_err());
        let curve = ScoreCurve::new(vec![1.0, 1.0], vec![0.2, 1.0]);
        assert!(curve.validate_cdf("x").is_err());
    }
}
