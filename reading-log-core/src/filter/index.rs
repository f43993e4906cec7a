//! Per-application lookup tables for the filter engine

use super::spec::{Candidate, SaccadeHeading};
use crate::types::Event;
use std::collections::HashMap;

/// Pass sizes and adjacent saccade directions, computed once per filter application
#[derive(Debug, Clone, Default)]
pub struct FixationIndex {
    /// (trial, region index, pass) -> fixations in that pass
    pass_sizes: HashMap<(u32, u32, u32), u32>,
    saccade_in: Vec<SaccadeHeading>,
    saccade_out: Vec<SaccadeHeading>,
}

impl FixationIndex {
    pub fn build(events: &[Event]) -> Self {
        let mut pass_sizes: HashMap<(u32, u32, u32), u32> = HashMap::new();
        for event in events {
            let (Some(trial), Some(reading)) = (event.trial_number(), event.reading.as_ref()) else {
                continue;
            };
            let size = pass_sizes
                .entry((trial, reading.region.index, reading.region_pass))
                .or_insert(0);
            *size = (*size).max(reading.fixation_in_pass);
        }

        let saccade_in = nearest_saccades(events.iter());
        let mut saccade_out = nearest_saccades(events.iter().rev());
        saccade_out.reverse();

        Self {
            pass_sizes,
            saccade_in,
            saccade_out,
        }
    }

    pub fn pass_size(&self, trial: u32, region: u32, pass: u32) -> u32 {
        self.pass_sizes.get(&(trial, region, pass)).copied().unwrap_or(0)
    }

    /// Filter candidate for the event at `index`, if it is an annotated fixation
    pub fn candidate<'e>(&self, events: &'e [Event], index: usize) -> Option<Candidate<'e>> {
        let event = &events[index];
        if !event.is_fixation() {
            return None;
        }
        let reading = event.reading.as_ref()?;
        let trial = event.trial_number()?;

        Some(Candidate {
            reading,
            pass_size: self.pass_size(trial, reading.region.index, reading.region_pass),
            saccade_in: self.saccade_in[index],
            saccade_out: self.saccade_out[index],
        })
    }
}

/// Heading of the nearest saccade already passed, in iteration order
///
/// The walk forgets the last saccade whenever the trial changes. The result
/// is in iteration order; callers walking backwards reverse it.
fn nearest_saccades<'e>(walk: impl ExactSizeIterator<Item = &'e Event>) -> Vec<SaccadeHeading> {
    let mut result = Vec::with_capacity(walk.len());
    let mut trial = None;
    let mut last = SaccadeHeading::Unclear;

    for event in walk {
        let current = event.trial_number();
        if current != trial {
            trial = current;
            last = SaccadeHeading::Unclear;
        }
        result.push(last);
        if event.is_saccade() {
            last = SaccadeHeading::from_displacement(event.payload.horizontal_displacement());
        }
    }
    result
}
