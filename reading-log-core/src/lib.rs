//! Reading Log Analyzer Library
//!
//! A reusable library for annotating eye-tracking event logs from reading
//! experiments and classifying fixations into six-digit bin codes.
//!
//! # Architecture
//!
//! Processing runs in sequential passes over one dataset at a time:
//! - The trial scanner finds trial, condition, item and sentence markers
//! - The annotator maps each fixation to a word and region and derives
//!   pass, first-pass, count and regression measures
//! - The terminal tracker relabels runs in the last region of the sentence
//! - A lookahead pass fills in the region visited next
//! - Filters select annotated fixations and relabel them with codes
//! - Bin aggregation describes every code found across datasets
//!
//! The library does NOT:
//! - Read or write files
//! - Parse any experiment software's export format
//! - Run statistics on the classified fixations
//!
//! File handling and reporting live in the application layer (reading-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use reading_log_core::{
//!     BinTable, BoundaryTable, EngineConfig, FilterSpec, FixedPitchLayout, PassOption,
//!     RawRecord, ReadingAnalyzer, TriggerVocabulary,
//! };
//!
//! let triggers = TriggerVocabulary::new("TRIAL_START", "TRIAL_END")
//!     .add_condition("COND 1", 1)
//!     .add_item("ITEM 1", 1);
//! let config = EngineConfig::new(triggers).with_terminal_region("Ending");
//! let analyzer = ReadingAnalyzer::new(config).unwrap();
//!
//! // Regions of condition 1, item 1 laid out in a fixed-pitch font
//! let layout = FixedPitchLayout::default()
//!     .build(&[("Pretarget", "The old man"), ("Target", "the boat."), ("Ending", "Then he left.")])
//!     .unwrap();
//! let mut boundaries = BoundaryTable::new();
//! boundaries.insert(1, 1, layout);
//!
//! let records: Vec<RawRecord> = Vec::new(); // loaded by the caller
//! let mut dataset = analyzer.load_dataset("p01", &records);
//! analyzer.annotate(&mut dataset, &boundaries).unwrap();
//!
//! let first_pass = FilterSpec::for_regions(["Target"]).with_pass([PassOption::FirstPass]);
//! let outcome = analyzer.apply_filter(&mut dataset, &first_pass).unwrap();
//! println!("{} first-pass fixations on the target", outcome.matched);
//!
//! for bin in BinTable::collect([&dataset]).entries() {
//!     println!("bin {}: {} ({})", bin.number, bin.code, bin.description);
//! }
//! ```

// Public modules
pub mod analyzer;
pub mod batch;
pub mod bins;
pub mod boundaries;
pub mod config;
pub mod dataset;
pub mod filter;
pub mod types;

// Re-export main types for convenience
pub use analyzer::ReadingAnalyzer;
pub use annotator::{AnnotationSummary, ReadingState};
pub use batch::{replay_filters, BatchOutcome};
pub use bins::{BinEntry, BinTable};
pub use boundaries::{BoundaryLookup, BoundaryTable, FixedPitchLayout, StimulusLayout, WordHit};
pub use config::{EngineConfig, FieldBindings, TerminalConfig, TriggerVocabulary};
pub use dataset::{AppliedFilter, Dataset};
pub use filter::{
    ClassificationCode, FilterOutcome, FilterSpec, FixationType, PassOption, RegionCodeMap,
    SaccadeDirection,
};
pub use lookahead::{next_regions, resolve_next_regions};
pub use scanner::{MarkerMatcher, TrialScanner, TrialSpan};
pub use terminal::{TerminalOutcome, TerminalState, TerminalTracker};
pub use types::{
    EngineError, Event, EventKind, EventPayload, FieldValue, Marker, RawRecord, ReadingAnnotation,
    RegionRef, Result, TrialContext, WordKey,
};

// Pipeline stages (driven through ReadingAnalyzer)
mod annotator;
mod lookahead;
mod scanner;
mod terminal;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an analyzer with the minimal vocabulary
        let analyzer = ReadingAnalyzer::new(EngineConfig::new(TriggerVocabulary::new("S", "E"))).unwrap();
        let mut dataset = Dataset::from_events("empty", Vec::new());
        let summary = analyzer.annotate(&mut dataset, &BoundaryTable::new()).unwrap();
        assert_eq!(summary.trials, 0);
        assert!(!VERSION.is_empty());
    }
}
