//! "Next region visited" lookahead
//!
//! The region a reader moves to after leaving the current one is only known
//! once later fixations have been seen, so it is derived in a second pass
//! over a trial that has already been causally annotated.

use crate::scanner::TrialSpan;
use crate::types::{Event, RegionRef};

/// For every annotated fixation of the trial, the first later region that differs
///
/// Pure: reads the causal annotation only.
pub fn next_regions(events: &[Event], span: &TrialSpan) -> Vec<(usize, Option<RegionRef>)> {
    let annotated: Vec<(usize, &RegionRef)> = span
        .range
        .clone()
        .filter_map(|index| events[index].reading.as_ref().map(|r| (index, &r.region)))
        .collect();

    let mut result = vec![(0, None); annotated.len()];
    let mut next: Option<RegionRef> = None;

    // Walk backwards: the next different region of fixation i is either the
    // region of fixation i+1 (if it differs) or fixation i+1's own answer.
    for pos in (0..annotated.len()).rev() {
        let (index, region) = annotated[pos];
        if let Some(&(_, following)) = annotated.get(pos + 1) {
            if following.index != region.index {
                next = Some(following.clone());
            }
        }
        result[pos] = (index, next.clone());
    }

    result
}

/// Write `next_region_visited` onto the trial's annotated fixations
pub fn resolve_next_regions(events: &mut [Event], span: &TrialSpan) {
    for (index, region) in next_regions(events, span) {
        if let Some(reading) = events[index].reading.as_mut() {
            reading.next_region_visited = region;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::ReadingState;
    use crate::types::WordKey;

    fn trial(regions: &[u32]) -> (Vec<Event>, TrialSpan) {
        let mut state = ReadingState::new();
        let mut events = vec![Event::marker("T_START")];
        for &r in regions {
            let mut event = Event::fixation("R_fixation", 0.0);
            let name = ["A", "B", "C"][r as usize - 1];
            event.reading = Some(state.observe(WordKey::new(r, 1), RegionRef::new(r, name)));
            events.push(event);
            // unannotated events in between are ignored
            events.push(Event::saccade("R_saccade", 0.0, 20.0));
        }
        let span = TrialSpan {
            number: 1,
            range: 0..events.len(),
            closed: true,
        };
        (events, span)
    }

    fn next_names(events: &[Event]) -> Vec<Option<String>> {
        events
            .iter()
            .filter_map(|e| e.reading.as_ref())
            .map(|r| r.next_region_visited.as_ref().map(|n| n.name.clone()))
            .collect()
    }

    #[test]
    fn test_next_region_visited() {
        let (mut events, span) = trial(&[1, 1, 2, 2, 1, 3]);
        resolve_next_regions(&mut events, &span);

        let expected: Vec<Option<String>> = ["B", "B", "A", "A", "C"]
            .iter()
            .map(|s| Some(s.to_string()))
            .chain(std::iter::once(None))
            .collect();
        assert_eq!(next_names(&events), expected);
    }

    #[test]
    fn test_single_region_trial() {
        let (mut events, span) = trial(&[2, 2, 2]);
        resolve_next_regions(&mut events, &span);
        assert_eq!(next_names(&events), vec![None, None, None]);
    }

    #[test]
    fn test_idempotent() {
        let (mut events, span) = trial(&[1, 2, 1, 3, 3, 2]);
        resolve_next_regions(&mut events, &span);
        let first = next_names(&events);
        resolve_next_regions(&mut events, &span);
        assert_eq!(next_names(&events), first);
    }
}
