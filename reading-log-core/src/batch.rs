//! Batch replay of a filter sequence over several datasets

use crate::dataset::Dataset;
use crate::filter::{apply_filter, FilterOutcome, FilterSpec};
use crate::types::Result;
use serde::Serialize;

/// Filter outcomes of one replayed dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReplay {
    pub dataset: String,
    pub outcomes: Vec<FilterOutcome>,
}

/// A dataset left untouched because a filter failed on it
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDataset {
    pub dataset: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub replayed: Vec<DatasetReplay>,
    pub skipped: Vec<SkippedDataset>,
}

impl BatchOutcome {
    pub fn total_matches(&self) -> usize {
        self.replayed
            .iter()
            .flat_map(|r| &r.outcomes)
            .map(|o| o.matched)
            .sum()
    }

    pub fn total_conflicts(&self) -> usize {
        self.replayed
            .iter()
            .flat_map(|r| &r.outcomes)
            .map(|o| o.conflicts.len())
            .sum()
    }
}

/// Reset each dataset's filters and apply `specs` in order
///
/// A dataset on which any filter fails is restored to its state before the
/// replay and reported as skipped; the remaining datasets are still processed.
pub fn replay_filters(datasets: &mut [Dataset], specs: &[FilterSpec]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for dataset in datasets.iter_mut() {
        let snapshot = dataset.clone();
        match replay_one(dataset, specs) {
            Ok(outcomes) => outcome.replayed.push(DatasetReplay {
                dataset: dataset.name().to_string(),
                outcomes,
            }),
            Err(e) => {
                log::warn!("Skipping dataset {}: {}", dataset.name(), e);
                *dataset = snapshot;
                outcome.skipped.push(SkippedDataset {
                    dataset: dataset.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Replayed {} filters over {} datasets ({} skipped)",
        specs.len(),
        outcome.replayed.len(),
        outcome.skipped.len()
    );
    outcome
}

fn replay_one(dataset: &mut Dataset, specs: &[FilterSpec]) -> Result<Vec<FilterOutcome>> {
    dataset.reset_filters();
    specs.iter().map(|spec| apply_filter(dataset, spec)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    #[test]
    fn test_unannotated_dataset_is_skipped() {
        let mut datasets = vec![Dataset::from_events("raw", vec![Event::fixation("R_fixation", 5.0)])];
        let outcome = replay_filters(&mut datasets, &[FilterSpec::for_regions(["A"])]);

        assert!(outcome.replayed.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].dataset, "raw");
        assert_eq!(datasets[0].filters_applied(), 0);
    }
}
