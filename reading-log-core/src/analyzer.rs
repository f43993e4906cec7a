//! Main analyzer API
//!
//! [`ReadingAnalyzer`] is the entry point of the library. It is built once
//! from a validated [`EngineConfig`] and then turns raw records into
//! datasets, annotates them against a boundary lookup and applies filters.

use crate::annotator::{annotate_trial, AnnotationSummary};
use crate::boundaries::BoundaryLookup;
use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::filter::{self, FilterOutcome, FilterSpec, RegionCodeMap};
use crate::lookahead::resolve_next_regions;
use crate::scanner::{MarkerMatcher, TrialScanner};
use crate::types::{EngineError, RawRecord, Result};

/// The analyzer - entry point for annotation and classification
pub struct ReadingAnalyzer {
    config: EngineConfig,
    matcher: MarkerMatcher,
    region_codes: RegionCodeMap,
}

impl ReadingAnalyzer {
    /// Create an analyzer; the configuration is validated before anything else
    ///
    /// # Example
    /// ```
    /// use reading_log_core::{EngineConfig, ReadingAnalyzer, TriggerVocabulary};
    ///
    /// let triggers = TriggerVocabulary::new("T_START", "T_END").add_condition("C1", 1);
    /// let analyzer = ReadingAnalyzer::new(EngineConfig::new(triggers)).unwrap();
    /// assert!(analyzer.config().region_codes.is_empty());
    /// ```
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let region_codes = if config.region_codes.is_empty() {
            RegionCodeMap::automatic()
        } else {
            RegionCodeMap::explicit(config.region_codes.clone())?
        };

        Ok(Self {
            matcher: MarkerMatcher::new(&config.triggers),
            config,
            region_codes,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a dataset from raw records with the configured field bindings
    pub fn load_dataset<'r>(
        &self,
        name: impl Into<String>,
        records: impl IntoIterator<Item = &'r RawRecord>,
    ) -> Dataset {
        Dataset::from_records(name, records, &self.config.fields)
    }

    /// Scan trials and annotate every fixation of the dataset
    ///
    /// Any earlier annotation is discarded first. A dataset that already has
    /// filters applied must be reset with [`Dataset::reset_filters`] before
    /// it can be annotated again.
    pub fn annotate(&self, dataset: &mut Dataset, lookup: &dyn BoundaryLookup) -> Result<AnnotationSummary> {
        if dataset.filters_applied() > 0 {
            return Err(EngineError::AlreadyClassified(format!(
                "dataset '{}' has {} filters applied",
                dataset.name(),
                dataset.filters_applied()
            )));
        }

        log::info!("Annotating {} ({} events)", dataset.name(), dataset.len());
        dataset.mark_unannotated();

        let events = dataset.events_mut();
        let trials = TrialScanner::new(&self.matcher).scan(events);

        let mut summary = AnnotationSummary {
            trials: trials.len(),
            ..AnnotationSummary::default()
        };
        for span in &trials {
            if annotate_trial(events, span, lookup, &self.config.terminal, &mut summary) {
                summary.regression_trials += 1;
            }
            resolve_next_regions(events, span);
        }

        log::info!(
            "{}: {} trials, {}/{} fixations annotated, {} regression trials",
            dataset.name(),
            summary.trials,
            summary.annotated,
            summary.fixations,
            summary.regression_trials
        );
        let off_text = summary.left_of_text + summary.right_of_text + summary.between_words;
        if off_text > 0 {
            log::debug!(
                "{}: {} fixations off text ({} left, {} right, {} between words)",
                dataset.name(),
                off_text,
                summary.left_of_text,
                summary.right_of_text,
                summary.between_words
            );
        }

        dataset.set_annotated(summary, self.region_codes.clone());
        Ok(summary)
    }

    /// Apply one filter to an annotated dataset
    pub fn apply_filter(&self, dataset: &mut Dataset, spec: &FilterSpec) -> Result<FilterOutcome> {
        filter::apply_filter(dataset, spec)
    }
}
