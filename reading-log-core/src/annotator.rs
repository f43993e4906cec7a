//! Region/word annotator
//!
//! Causal pass over one trial. Each active fixation is resolved to a word
//! and region, and the per-trial [`ReadingState`] derives pass numbers,
//! first-pass flags, fixation counts and regression flags from what has been
//! read so far. The terminal tracker runs alongside and may relabel
//! buffered fixations when its run resolves.

use crate::boundaries::{BoundaryLookup, WordHit};
use crate::config::TerminalConfig;
use crate::scanner::TrialSpan;
use crate::terminal::{TerminalOutcome, TerminalTracker};
use crate::types::{Event, ReadingAnnotation, RegionRef, WordKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Counters reported after annotating a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub trials: usize,
    pub fixations: usize,
    pub annotated: usize,
    /// Outside the sentence window
    pub skipped_inactive: usize,
    /// Condition or item trigger not seen yet
    pub skipped_no_stimulus: usize,
    /// No layout for the (condition, item) pair
    pub skipped_missing_layout: usize,
    pub skipped_invalid_position: usize,
    pub left_of_text: usize,
    pub right_of_text: usize,
    pub between_words: usize,
    pub regression_trials: usize,
}

/// Everything remembered about one trial's reading so far
#[derive(Debug, Clone, Default)]
pub struct ReadingState {
    visited_regions: HashSet<u32>,
    visited_words: HashSet<WordKey>,
    highest_region: Option<u32>,
    highest_word: Option<WordKey>,
    word_counts: HashMap<WordKey, u32>,
    region_counts: HashMap<u32, u32>,
    region_passes: HashMap<u32, u32>,
    previous: Option<(WordKey, RegionRef)>,
    pass_origin: Option<RegionRef>,
    fixation_in_pass: u32,
}

impl ReadingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fixation on `word` in `region` and derive its annotation
    pub fn observe(&mut self, word: WordKey, region: RegionRef) -> ReadingAnnotation {
        let (previous_word, previous_region) = match &self.previous {
            Some((w, r)) => (Some(*w), Some(r.clone())),
            None => (None, None),
        };

        let same_region = previous_region.as_ref().map(|r| r.index) == Some(region.index);
        if same_region {
            self.fixation_in_pass += 1;
        } else {
            self.pass_origin = previous_region.clone();
            self.fixation_in_pass = 1;
            *self.region_passes.entry(region.index).or_insert(0) += 1;
        }

        let first_pass_region = !self.visited_regions.contains(&region.index)
            && self.highest_region.map_or(true, |h| h < region.index);
        let first_pass_word = !self.visited_words.contains(&word)
            && self.highest_word.map_or(true, |h| h < word);

        let word_regression = previous_word.map_or(false, |p| {
            word.region < p.region || (word.region == p.region && word.word < p.word)
        });
        let region_regression = previous_word.map_or(false, |p| word.region < p.region);

        let word_fixation_count = {
            let count = self.word_counts.entry(word).or_insert(0);
            *count += 1;
            *count
        };
        let region_fixation_count = {
            let count = self.region_counts.entry(region.index).or_insert(0);
            *count += 1;
            *count
        };

        self.visited_regions.insert(region.index);
        self.visited_words.insert(word);
        self.highest_region = Some(self.highest_region.map_or(region.index, |h| h.max(region.index)));
        self.highest_word = Some(self.highest_word.map_or(word, |h| h.max(word)));
        self.previous = Some((word, region.clone()));

        ReadingAnnotation {
            word,
            region_pass: self.region_passes[&region.index],
            fixation_in_pass: self.fixation_in_pass,
            last_region_visited: self.pass_origin.clone(),
            next_region_visited: None,
            region,
            previous_word,
            previous_region,
            first_pass_region,
            first_pass_word,
            word_fixation_count,
            region_fixation_count,
            word_regression,
            region_regression,
        }
    }

    /// Regions visited so far, ascending
    pub fn visited_regions(&self) -> BTreeSet<u32> {
        self.visited_regions.iter().copied().collect()
    }
}

/// Causal annotation of one trial
///
/// Returns true if the trial was flagged as a regression trial.
pub(crate) fn annotate_trial(
    events: &mut [Event],
    span: &TrialSpan,
    lookup: &dyn BoundaryLookup,
    terminal: &TerminalConfig,
    summary: &mut AnnotationSummary,
) -> bool {
    let mut state = ReadingState::new();
    let mut tracker = TerminalTracker::new(terminal.region.as_deref());
    let mut regression_trial = false;
    let mut missing_layouts = BTreeSet::new();

    for index in span.range.clone() {
        let event = &mut events[index];
        if !event.is_fixation() {
            continue;
        }
        summary.fixations += 1;

        let Some(context) = event.trial else { continue };
        if !context.active {
            summary.skipped_inactive += 1;
            continue;
        }
        let (Some(condition), Some(item)) = (context.condition, context.item) else {
            summary.skipped_no_stimulus += 1;
            continue;
        };
        let Some(layout) = lookup.layout(condition, item) else {
            summary.skipped_missing_layout += 1;
            missing_layouts.insert((condition, item));
            continue;
        };
        let Some(x) = event.fixation_x() else {
            summary.skipped_invalid_position += 1;
            continue;
        };

        let word = match layout.resolve(x) {
            WordHit::Word(word) => word,
            WordHit::LeftOfText => {
                summary.left_of_text += 1;
                continue;
            }
            WordHit::RightOfText => {
                summary.right_of_text += 1;
                continue;
            }
            WordHit::Gap => {
                summary.between_words += 1;
                continue;
            }
        };
        let Some(region) = layout.region(word.region) else {
            continue;
        };
        let region = RegionRef::new(region.index, region.name.clone());

        log::trace!("Event {}: x={} -> word {} in {}", index, x, word, region);
        let annotation = state.observe(word, region);
        let resolution = tracker.observe(index, &annotation.region.name, word);
        event.reading = Some(annotation);
        summary.annotated += 1;

        if let Some(resolution) = resolution {
            regression_trial |= resolution.outcome == TerminalOutcome::Regression;
            for (buffered, label) in resolution.labels(terminal) {
                events[buffered].relabel(label);
            }
        }
    }

    if let Some(resolution) = tracker.finish() {
        for (buffered, label) in resolution.labels(terminal) {
            events[buffered].relabel(label);
        }
    }

    for (condition, item) in missing_layouts {
        log::warn!(
            "Trial {}: no boundaries for condition {} item {}; fixations skipped",
            span.number,
            condition,
            item
        );
    }

    if regression_trial {
        for event in &mut events[span.range.clone()] {
            if let Some(context) = event.trial.as_mut() {
                context.regression_trial = true;
            }
        }
    }

    log::debug!(
        "Trial {}: {} regions visited{}",
        span.number,
        state.visited_regions().len(),
        if regression_trial { ", regression trial" } else { "" }
    );
    regression_trial
}
