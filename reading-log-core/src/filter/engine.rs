//! Filter application
//!
//! Everything that can fail is checked and computed against the untouched
//! dataset first; mutation happens only once the whole application is known
//! to succeed.

use super::code::{ClassificationCode, MAX_CODE_FIELD};
use super::index::FixationIndex;
use super::spec::FilterSpec;
use crate::dataset::Dataset;
use crate::types::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// A match that already carried a code from an earlier filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Event index in the dataset
    pub index: usize,
    pub existing: ClassificationCode,
    pub attempted: ClassificationCode,
}

/// Result of one filter application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// 1-based sequence index of this filter within the dataset
    pub filter_index: u32,
    pub matched: usize,
    pub conflicts: Vec<Conflict>,
}

impl FilterOutcome {
    /// Conflicts as a percentage of matches
    pub fn conflict_percentage(&self) -> f64 {
        if self.matched == 0 {
            0.0
        } else {
            self.conflicts.len() as f64 * 100.0 / self.matched as f64
        }
    }
}

/// Apply one filter to an annotated dataset
///
/// Matches are relabeled with their classification code. A match already
/// classified by an earlier filter keeps its code and is reported as a
/// conflict; it still counts as a match.
pub fn apply_filter(dataset: &mut Dataset, spec: &FilterSpec) -> Result<FilterOutcome> {
    spec.validate()?;
    if !dataset.is_annotated() {
        return Err(EngineError::NotAnnotated(dataset.name().to_string()));
    }

    let filter_index = dataset.filters_applied() + 1;
    if filter_index > MAX_CODE_FIELD {
        return Err(EngineError::CodeOverflow(format!(
            "dataset '{}' already has {} filters applied",
            dataset.name(),
            dataset.filters_applied()
        )));
    }

    let mut region_codes = dataset.region_codes().clone();
    region_codes.register(&spec.regions)?;

    let events = dataset.events();
    let index = FixationIndex::build(events);
    let mut matches = Vec::new();
    for position in 0..events.len() {
        let Some(candidate) = index.candidate(events, position) else {
            continue;
        };
        if !spec.matches(&candidate) {
            continue;
        }
        let condition = events[position].trial.and_then(|t| t.condition);
        let region = region_codes.code_for(&candidate.reading.region.name);
        matches.push((position, ClassificationCode::derive(condition, region, filter_index)?));
    }

    let mut conflicts = Vec::new();
    let events = dataset.events_mut();
    for &(position, code) in &matches {
        let event = &mut events[position];
        match event.code {
            Some(existing) => conflicts.push(Conflict {
                index: position,
                existing,
                attempted: code,
            }),
            None => event.classify(code),
        }
    }

    let outcome = FilterOutcome {
        filter_index,
        matched: matches.len(),
        conflicts,
    };
    dataset.record_filter(spec.clone(), region_codes, &outcome);

    log::info!(
        "{}: filter {:02} matched {} fixations",
        dataset.name(),
        filter_index,
        outcome.matched
    );
    if !outcome.conflicts.is_empty() {
        log::warn!(
            "{}: filter {:02} hit {} already classified fixations ({:.1}% of matches); earlier codes kept",
            dataset.name(),
            filter_index,
            outcome.conflicts.len(),
            outcome.conflict_percentage()
        );
        for conflict in &outcome.conflicts {
            log::debug!(
                "Event {}: keeps {} over {}",
                conflict.index,
                conflict.existing,
                conflict.attempted
            );
        }
    }

    Ok(outcome)
}
