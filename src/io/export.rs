//! Export run results to JSON and CSV.
//!
//! The JSON file carries everything a run produced, wrapped with a small
//! header. The CSV file is one row per (step, group) and is meant for
//! spreadsheets and downstream scripts.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Policy;
use crate::error::AppError;
use crate::sim::RunOutput;

#[derive(Debug, Serialize)]
struct RunFile<'a> {
    tool: &'static str,
    generated_at: DateTime<Utc>,
    policy: Policy,
    steps: u64,
    run: &'a RunOutput,
}

/// Write the whole run as pretty JSON.
pub fn write_run_json(path: &Path, output: &RunOutput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create run JSON '{}': {e}", path.display())))?;

    let doc = RunFile {
        tool: "cmsim",
        generated_at: Utc::now(),
        policy: output.market.policy,
        steps: output.market.step,
        run: output,
    };

    serde_json::to_writer_pretty(file, &doc)
        .map_err(|e| AppError::new(2, format!("Failed to write run JSON: {e}")))?;

    Ok(())
}

/// Write the cumulative per-group series and each bank's anchor rates, one row
/// per step and group. Step 0 is the initial state.
pub fn write_series_csv(path: &Path, output: &RunOutput) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let banks = output.bank_names();
    let mut header = vec![
        "step".to_string(),
        "group".to_string(),
        "loans".to_string(),
        "utility".to_string(),
        "mean_score_change".to_string(),
    ];
    for bank in &banks {
        header.push(format!("{bank} max rate"));
        header.push(format!("{bank} min rate"));
    }
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let series = &output.market;
    for step in 0..=series.step as usize {
        for group in output.group_names() {
            let mut row = vec![
                step.to_string(),
                group.to_string(),
                cell(series.loans.get(group).and_then(|s| s.get(step)).map(|v| v.to_string())),
                cell(series.utility.get(group).and_then(|s| s.get(step)).map(|v| format!("{v:.6}"))),
                cell(
                    output
                        .mean_score_change
                        .get(group)
                        .and_then(|s| s.get(step))
                        .map(|v| format!("{v:.4}")),
                ),
            ];
            for bank in &banks {
                row.push(cell(series.max_irates.get(*bank).and_then(|s| s.get(step)).map(|v| format!("{v:.5}"))));
                row.push(cell(series.min_irates.get(*bank).and_then(|s| s.get(step)).map(|v| format!("{v:.5}"))));
            }
            writer
                .write_record(&row)
                .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

fn cell(v: Option<String>) -> String {
    v.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{StatisticsSource, SyntheticStatistics};
    use crate::domain::SimConfig;
    use crate::sim::Simulation;

    fn run(steps: u64) -> RunOutput {
        let stats = SyntheticStatistics::standard(3).load_group_statistics().unwrap();
        let mut sim = Simulation::from_seed(&SimConfig::default(), &stats, 3).unwrap();
        sim.run(steps).unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("cmsim-{}-{name}", std::process::id()))
    }

    #[test]
    fn run_json_has_header_and_payload() {
        let output = run(2);
        let path = temp_path("run.json");
        write_run_json(&path, &output).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["tool"], "cmsim");
        assert_eq!(doc["policy"], "max-utility");
        assert_eq!(doc["steps"], 2);
        assert!(doc["generated_at"].is_string());
        assert_eq!(doc["run"]["steps"].as_array().unwrap().len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn series_csv_has_a_row_per_step_and_group() {
        let output = run(3);
        let path = temp_path("series.csv");
        write_series_csv(&path, &output).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "step");
        assert_eq!(headers.len(), 5 + 2 * 3);
        assert_eq!(&headers[5], "reference max rate");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4 * 2);
        assert_eq!(&rows[0][0], "0");
        assert_eq!(&rows[0][1], "White");
        assert_eq!(&rows[0][2], "0");
        assert_eq!(&rows[0][5], "0.15000");
        assert!(rows.iter().all(|r| r.iter().all(|c| !c.is_empty())));
        std::fs::remove_file(&path).ok();
    }
}
