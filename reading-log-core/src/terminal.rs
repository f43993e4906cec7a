//! Terminal-region regression tracker
//!
//! Watches the last region of the sentence (typically "Ending"). Fixations
//! in that region are buffered until the run is over; only then is it known
//! whether the reader left the sentence normally or regressed, and the whole
//! buffered run is relabeled at once.

use crate::config::TerminalConfig;
use crate::types::WordKey;

/// How a buffered terminal run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// Trial ended while still reading the terminal region
    NoRegression,
    /// The reader moved back, either out of the region or to an earlier word in it
    Regression,
}

/// A resolved terminal run: buffered event indices in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: TerminalOutcome,
    pub buffered: Vec<usize>,
}

impl Resolution {
    /// Label to write onto each buffered event
    pub fn labels<'c>(&self, config: &'c TerminalConfig) -> Vec<(usize, &'c str)> {
        let last = self.buffered.len().saturating_sub(1);
        self.buffered
            .iter()
            .enumerate()
            .map(|(pos, &index)| {
                let label = match self.outcome {
                    TerminalOutcome::NoRegression => &config.no_regression_label,
                    TerminalOutcome::Regression if pos == last => &config.triggering_label,
                    TerminalOutcome::Regression => &config.pre_regression_label,
                };
                (index, label.as_str())
            })
            .collect()
    }
}

/// Tracker state within one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    Idle,
    Buffering { indices: Vec<usize>, last_word: u32 },
    /// The trial's terminal run has been resolved; nothing more is tracked
    Resolved,
}

/// Per-trial terminal-region state machine
#[derive(Debug, Clone)]
pub struct TerminalTracker {
    region: Option<String>,
    state: TerminalState,
}

impl TerminalTracker {
    /// Create a tracker for one trial; `None` disables tracking
    pub fn new(region: Option<&str>) -> Self {
        Self {
            region: region.map(str::to_string),
            state: TerminalState::Idle,
        }
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    /// Feed one annotated fixation; returns a resolution when the run ends here
    pub fn observe(&mut self, index: usize, region: &str, word: WordKey) -> Option<Resolution> {
        let terminal = self.region.as_deref()?;

        match &mut self.state {
            TerminalState::Resolved => None,
            TerminalState::Idle if region == terminal => {
                self.state = TerminalState::Buffering {
                    indices: vec![index],
                    last_word: word.word,
                };
                None
            }
            TerminalState::Idle => None,
            TerminalState::Buffering { indices, last_word } if region == terminal => {
                indices.push(index);
                if word.word < *last_word {
                    log::trace!("Backward word move inside terminal region at event {}", index);
                    return self.resolve(TerminalOutcome::Regression);
                }
                *last_word = word.word;
                None
            }
            TerminalState::Buffering { .. } => {
                log::trace!("Left terminal region at event {}", index);
                self.resolve(TerminalOutcome::Regression)
            }
        }
    }

    /// Trial end: a run still buffered ended without regression
    pub fn finish(&mut self) -> Option<Resolution> {
        match self.state {
            TerminalState::Buffering { .. } => self.resolve(TerminalOutcome::NoRegression),
            _ => None,
        }
    }

    fn resolve(&mut self, outcome: TerminalOutcome) -> Option<Resolution> {
        match std::mem::replace(&mut self.state, TerminalState::Resolved) {
            TerminalState::Buffering { indices, .. } => Some(Resolution {
                outcome,
                buffered: indices,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(region: u32, word: u32) -> WordKey {
        WordKey::new(region, word)
    }

    #[test]
    fn test_run_until_trial_end() {
        let mut tracker = TerminalTracker::new(Some("Ending"));
        assert!(tracker.observe(3, "Target", key(3, 1)).is_none());
        assert!(tracker.observe(4, "Ending", key(4, 1)).is_none());
        assert!(tracker.observe(6, "Ending", key(4, 2)).is_none());
        assert!(tracker.observe(8, "Ending", key(4, 3)).is_none());

        let resolution = tracker.finish().unwrap();
        assert_eq!(resolution.outcome, TerminalOutcome::NoRegression);
        assert_eq!(resolution.buffered, vec![4, 6, 8]);

        let config = TerminalConfig::default();
        let labels = resolution.labels(&config);
        assert!(labels.iter().all(|(_, l)| *l == "Ending_NoReg"));
    }

    #[test]
    fn test_backward_word_inside_region() {
        let mut tracker = TerminalTracker::new(Some("Ending"));
        tracker.observe(1, "Ending", key(4, 1));
        tracker.observe(2, "Ending", key(4, 3));
        let resolution = tracker.observe(3, "Ending", key(4, 2)).unwrap();

        assert_eq!(resolution.outcome, TerminalOutcome::Regression);
        let config = TerminalConfig::default();
        assert_eq!(
            resolution.labels(&config),
            vec![(1, "Ending_PreReg"), (2, "Ending_PreReg"), (3, "Ending_RegTrigger")]
        );

        // resolved once per trial
        assert_eq!(tracker.state(), &TerminalState::Resolved);
        assert!(tracker.observe(4, "Ending", key(4, 1)).is_none());
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn test_exit_from_region() {
        let mut tracker = TerminalTracker::new(Some("Ending"));
        tracker.observe(5, "Ending", key(4, 1));
        tracker.observe(6, "Ending", key(4, 2));
        let resolution = tracker.observe(7, "Target", key(3, 1)).unwrap();

        assert_eq!(resolution.outcome, TerminalOutcome::Regression);
        assert_eq!(resolution.buffered, vec![5, 6]);
        let config = TerminalConfig::default();
        assert_eq!(resolution.labels(&config)[1], (6, "Ending_RegTrigger"));
    }

    #[test]
    fn test_disabled_tracker() {
        let mut tracker = TerminalTracker::new(None);
        assert!(tracker.observe(1, "Ending", key(4, 1)).is_none());
        assert!(tracker.finish().is_none());
        assert_eq!(tracker.state(), &TerminalState::Idle);
    }
}
