//! Trial scanner
//!
//! Single forward pass over the event sequence. Recognizes trial start/end
//! markers, condition/item triggers and the optional sentence window, and
//! writes the applicable [`TrialContext`] onto every event inside a trial.

use crate::config::{normalize_label, TriggerVocabulary};
use crate::types::{Event, EventPayload, Marker, TrialContext};
use std::collections::HashMap;
use std::ops::Range;

/// One trial of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSpan {
    /// 1-based trial number
    pub number: u32,
    /// Event indices from the start marker up to and including the end marker
    pub range: Range<usize>,
    /// False if the trial was cut short by a new start marker or the end of the stream
    pub closed: bool,
}

/// Label to marker lookup, built once from the trigger vocabulary
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    markers: HashMap<String, Marker>,
    gated: bool,
}

impl MarkerMatcher {
    pub fn new(vocabulary: &TriggerVocabulary) -> Self {
        let mut markers = HashMap::new();
        markers.insert(normalize_label(&vocabulary.trial_start), Marker::TrialStart);
        markers.insert(normalize_label(&vocabulary.trial_end), Marker::TrialEnd);
        for (label, number) in &vocabulary.conditions {
            markers.insert(normalize_label(label), Marker::Condition(*number));
        }
        for (label, number) in &vocabulary.items {
            markers.insert(normalize_label(label), Marker::Item(*number));
        }
        if let (Some(start), Some(end)) = (&vocabulary.sentence_start, &vocabulary.sentence_end) {
            markers.insert(normalize_label(start), Marker::SentenceStart);
            markers.insert(normalize_label(end), Marker::SentenceEnd);
        }

        Self {
            markers,
            gated: vocabulary.is_gated(),
        }
    }

    /// Marker for a label, if the label is part of the vocabulary
    pub fn classify(&self, label: &str) -> Option<Marker> {
        self.markers.get(&normalize_label(label)).copied()
    }

    pub fn is_gated(&self) -> bool {
        self.gated
    }
}

/// Trial currently being scanned
struct OpenTrial {
    number: u32,
    start: usize,
    condition: Option<u32>,
    item: Option<u32>,
    active: bool,
}

impl OpenTrial {
    fn context(&self) -> TrialContext {
        TrialContext {
            trial: self.number,
            condition: self.condition,
            item: self.item,
            active: self.active,
            regression_trial: false,
        }
    }

    fn close(self, end: usize, closed: bool) -> TrialSpan {
        TrialSpan {
            number: self.number,
            range: self.start..end,
            closed,
        }
    }
}

/// Forward scanner over one dataset's events
pub struct TrialScanner<'a> {
    matcher: &'a MarkerMatcher,
}

impl<'a> TrialScanner<'a> {
    pub fn new(matcher: &'a MarkerMatcher) -> Self {
        Self { matcher }
    }

    /// Mark triggers and write trial contexts; returns the trials found
    pub fn scan(&self, events: &mut [Event]) -> Vec<TrialSpan> {
        let mut trials = Vec::new();
        let mut current: Option<OpenTrial> = None;
        let mut trial_count = 0u32;

        for (index, event) in events.iter_mut().enumerate() {
            event.marker = match event.payload {
                EventPayload::Marker => self.matcher.classify(&event.label),
                _ => None,
            };

            match event.marker {
                Some(Marker::TrialStart) => {
                    if let Some(open) = current.take() {
                        log::warn!(
                            "Trial {} has no end marker before the next start (event {})",
                            open.number,
                            index
                        );
                        trials.push(open.close(index, false));
                    }
                    trial_count += 1;
                    current = Some(OpenTrial {
                        number: trial_count,
                        start: index,
                        condition: None,
                        item: None,
                        active: !self.matcher.is_gated(),
                    });
                }
                Some(Marker::TrialEnd) => {
                    match current.take() {
                        Some(open) => {
                            event.trial = Some(open.context());
                            trials.push(open.close(index + 1, true));
                        }
                        None => log::debug!("Trial end marker outside any trial (event {})", index),
                    }
                    continue;
                }
                Some(Marker::Condition(number)) => match current.as_mut() {
                    Some(open) => open.condition = Some(number),
                    None => log::debug!("Condition trigger outside any trial (event {})", index),
                },
                Some(Marker::Item(number)) => match current.as_mut() {
                    Some(open) => open.item = Some(number),
                    None => log::debug!("Item trigger outside any trial (event {})", index),
                },
                Some(Marker::SentenceStart) => {
                    if let Some(open) = current.as_mut() {
                        open.active = true;
                    }
                }
                Some(Marker::SentenceEnd) => {
                    if let Some(open) = current.as_mut() {
                        open.active = false;
                    }
                }
                None => {}
            }

            event.trial = current.as_ref().map(OpenTrial::context);
        }

        if let Some(open) = current {
            log::warn!("Trial {} is still open at the end of the stream", open.number);
            trials.push(open.close(events.len(), false));
        }

        log::debug!("Scanned {} events, found {} trials", events.len(), trials.len());
        trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(gated: bool) -> MarkerMatcher {
        let mut vocab = TriggerVocabulary::new("T_START", "T_END")
            .add_condition("C1", 1)
            .add_condition("C2", 2)
            .add_item("I1", 1)
            .add_item("I7", 7);
        if gated {
            vocab = vocab.with_sentence_markers("S_ON", "S_OFF");
        }
        MarkerMatcher::new(&vocab)
    }

    #[test]
    fn test_classify_normalizes_whitespace() {
        let m = matcher(false);
        assert_eq!(m.classify(" T_START "), Some(Marker::TrialStart));
        assert_eq!(m.classify("C2"), Some(Marker::Condition(2)));
        assert_eq!(m.classify("X9"), None);
    }

    #[test]
    fn test_trial_numbering_and_triggers() {
        let m = matcher(false);
        let mut events = vec![
            Event::fixation("R_fixation", 1.0), // before any trial
            Event::marker("T_START"),
            Event::fixation("R_fixation", 2.0), // before triggers
            Event::marker("C2"),
            Event::marker("I7"),
            Event::fixation("R_fixation", 3.0),
            Event::marker("T_END"),
            Event::fixation("R_fixation", 4.0), // between trials
            Event::marker("T_START"),
            Event::marker("C1"),
            Event::fixation("R_fixation", 5.0),
            Event::marker("T_END"),
        ];

        let trials = TrialScanner::new(&m).scan(&mut events);
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].range, 1..7);
        assert_eq!(trials[1].number, 2);
        assert!(trials.iter().all(|t| t.closed));

        assert!(events[0].trial.is_none());
        assert_eq!(events[2].trial.unwrap().condition, None);
        let ctx = events[5].trial.unwrap();
        assert_eq!((ctx.trial, ctx.condition, ctx.item), (1, Some(2), Some(7)));
        assert_eq!(events[6].trial_number(), Some(1));
        assert!(events[7].trial.is_none());

        // condition and item reset at trial start
        let ctx = events[10].trial.unwrap();
        assert_eq!((ctx.trial, ctx.condition, ctx.item), (2, Some(1), None));
    }

    #[test]
    fn test_sentence_gating() {
        let m = matcher(true);
        let mut events = vec![
            Event::marker("T_START"),
            Event::fixation("R_fixation", 1.0),
            Event::marker("S_ON"),
            Event::fixation("R_fixation", 2.0),
            Event::marker("S_OFF"),
            Event::fixation("R_fixation", 3.0),
            Event::marker("T_END"),
        ];
        TrialScanner::new(&m).scan(&mut events);
        assert!(!events[1].trial.unwrap().active);
        assert!(events[3].trial.unwrap().active);
        assert!(!events[5].trial.unwrap().active);
    }

    #[test]
    fn test_unterminated_trials() {
        let m = matcher(false);
        let mut events = vec![
            Event::marker("T_START"),
            Event::fixation("R_fixation", 1.0),
            Event::marker("T_START"),
            Event::fixation("R_fixation", 2.0),
        ];
        let trials = TrialScanner::new(&m).scan(&mut events);
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].range, 0..2);
        assert!(!trials[0].closed);
        assert_eq!(trials[1].range, 2..4);
        assert_eq!(events[3].trial_number(), Some(2));
    }

    #[test]
    fn test_fixation_label_never_marks() {
        // A fixation whose label collides with a trigger stays a fixation
        let m = matcher(false);
        let mut events = vec![Event::fixation("T_START", 1.0)];
        let trials = TrialScanner::new(&m).scan(&mut events);
        assert!(trials.is_empty());
        assert!(events[0].marker.is_none());
    }
}
