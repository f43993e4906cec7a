//! Report generation
//!
//! Writes the bin descriptor file, one pretty JSON file per annotated
//! dataset and a JSON run summary.

use crate::input::SkippedInput;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use reading_log_core::{AnnotationSummary, BatchOutcome, BinTable, Dataset};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Render the bin table as `bin N` / description / `.{code}` blocks
pub fn render_bins(bins: &BinTable) -> String {
    bins.entries()
        .map(|entry| format!("bin {}\n{}\n.{}\n", entry.number, entry.description, entry.code))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_bins(path: &Path, bins: &BinTable) -> Result<()> {
    fs::write(path, render_bins(bins)).with_context(|| format!("Failed to write bins file: {:?}", path))?;
    log::info!("Wrote {} bins to {:?}", bins.len(), path);
    Ok(())
}

/// Write each dataset to `<dir>/<name>.annotated.json`
pub fn write_datasets(dir: &Path, datasets: &[Dataset]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        let path = dir.join(format!("{}.annotated.json", dataset.name()));
        let json = serde_json::to_string_pretty(dataset)
            .with_context(|| format!("Failed to serialize dataset {}", dataset.name()))?;
        fs::write(&path, json).with_context(|| format!("Failed to write dataset file: {:?}", path))?;
        log::debug!("Wrote {:?}", path);
        written.push(path);
    }
    Ok(written)
}

/// Per-dataset line of the run summary
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub annotation: Option<AnnotationSummary>,
    pub filters_applied: u32,
    pub last_match_count: usize,
}

/// Everything a run produced, for the summary file
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(skip)]
    pub timestamp: DateTime<Local>,
    /// RFC 3339 generation time
    pub generated_at: String,
    pub tool_version: String,
    pub datasets: Vec<DatasetSummary>,
    /// Event files that could not be decoded
    pub skipped_inputs: Vec<SkippedInput>,
    pub batch: BatchOutcome,
    pub bins: usize,
}

impl RunSummary {
    pub fn new(datasets: &[Dataset], skipped_inputs: Vec<SkippedInput>, batch: BatchOutcome, bins: &BinTable) -> Self {
        let timestamp = Local::now();
        Self {
            timestamp,
            generated_at: timestamp.to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            datasets: datasets
                .iter()
                .map(|d| DatasetSummary {
                    name: d.name().to_string(),
                    annotation: d.annotation().copied(),
                    filters_applied: d.filters_applied(),
                    last_match_count: d.last_match_count(),
                })
                .collect(),
            skipped_inputs,
            batch,
            bins: bins.len(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        fs::write(path, json).with_context(|| format!("Failed to write run summary: {:?}", path))
    }

    /// Print a short human-readable summary to stdout
    pub fn print(&self) {
        println!("═══════════════════════════════════════════════");
        println!("  Reading Log Analyzer - Run Summary");
        println!("  {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!("═══════════════════════════════════════════════\n");

        for dataset in &self.datasets {
            match &dataset.annotation {
                Some(a) => println!(
                    "  {:<20} {:>4} trials  {:>6}/{:<6} fixations annotated  {:>3} regression trials",
                    dataset.name, a.trials, a.annotated, a.fixations, a.regression_trials
                ),
                None => println!("  {:<20} not annotated", dataset.name),
            }
        }

        for skipped in &self.skipped_inputs {
            println!("  {:<20} skipped: {}", skipped.path.display(), skipped.reason);
        }

        println!(
            "\n  Matches: {}  Conflicts: {}  Skipped datasets: {}",
            self.batch.total_matches(),
            self.batch.total_conflicts(),
            self.batch.skipped.len() + self.skipped_inputs.len()
        );
        println!("  Bins: {}", self.bins);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reading_log_core::Event;

    fn classified(codes: &[&str]) -> Dataset {
        let events = codes
            .iter()
            .map(|code| {
                let mut event = Event::fixation("R_fixation", 0.0);
                event.classify(code.parse().unwrap());
                event
            })
            .collect();
        Dataset::from_events("p01", events)
    }

    #[test]
    fn test_render_bins() {
        let dataset = classified(&["010203", "020101"]);
        let bins = BinTable::collect([&dataset]);

        assert_eq!(
            render_bins(&bins),
            "bin 1\ncondition 1, filter code 3\n.010203\n\nbin 2\ncondition 2, filter code 1\n.020101\n"
        );
        assert_eq!(render_bins(&BinTable::default()), "");
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let datasets = vec![classified(&["010101"])];
        let bins = BinTable::collect(&datasets);

        let written = write_datasets(dir.path(), &datasets).unwrap();
        assert_eq!(written, vec![dir.path().join("p01.annotated.json")]);
        let restored: Dataset = serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(restored.events()[0].label, "010101");

        let skipped = vec![SkippedInput {
            path: PathBuf::from("p02.json"),
            reason: "Failed to parse event file".to_string(),
        }];
        let summary = RunSummary::new(&datasets, skipped, BatchOutcome::default(), &bins);
        let path = dir.path().join("summary.json");
        summary.write(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["bins"], 1);
        assert_eq!(json["datasets"][0]["name"], "p01");
        assert!(json["generated_at"].is_string());
        assert_eq!(json["skipped_inputs"][0]["path"], "p02.json");
    }
}
