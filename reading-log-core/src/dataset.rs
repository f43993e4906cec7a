//! Datasets
//!
//! A [`Dataset`] owns one participant's ordered event list together with the
//! state accumulated while annotating and filtering it.

use crate::annotator::AnnotationSummary;
use crate::config::FieldBindings;
use crate::filter::{ClassificationCode, FilterOutcome, FilterSpec, RegionCodeMap};
use crate::types::{Event, RawRecord};
use serde::{Deserialize, Serialize};

/// One filter application as recorded on the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFilter {
    /// 1-based sequence index; the last two digits of every code it produced
    pub index: u32,
    pub spec: FilterSpec,
    pub matched: usize,
    pub conflicts: usize,
}

/// An ordered event list plus its annotation and filter history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    name: String,
    events: Vec<Event>,
    /// Set once the dataset has been annotated
    #[serde(default)]
    annotation: Option<AnnotationSummary>,
    #[serde(default)]
    filters_applied: u32,
    #[serde(default)]
    applied: Vec<AppliedFilter>,
    #[serde(default)]
    last_match_count: usize,
    #[serde(default)]
    region_codes: RegionCodeMap,
}

impl Dataset {
    /// Build a dataset from raw records using the configured field bindings
    pub fn from_records<'r>(
        name: impl Into<String>,
        records: impl IntoIterator<Item = &'r RawRecord>,
        fields: &FieldBindings,
    ) -> Self {
        let events = records
            .into_iter()
            .map(|record| Event::from_record(record, fields))
            .collect();
        Self::from_events(name, events)
    }

    pub fn from_events(name: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            name: name.into(),
            events,
            annotation: None,
            filters_applied: 0,
            applied: Vec::new(),
            last_match_count: 0,
            region_codes: RegionCodeMap::automatic(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_annotated(&self) -> bool {
        self.annotation.is_some()
    }

    pub fn annotation(&self) -> Option<&AnnotationSummary> {
        self.annotation.as_ref()
    }

    /// Total filters applied; never decreases except through [`Dataset::reset_filters`]
    pub fn filters_applied(&self) -> u32 {
        self.filters_applied
    }

    /// Filters in application order
    pub fn applied_filters(&self) -> &[AppliedFilter] {
        &self.applied
    }

    /// Filter with the given sequence index
    pub fn applied_filter(&self, index: u32) -> Option<&AppliedFilter> {
        self.applied.iter().find(|f| f.index == index)
    }

    /// Matches of the most recent filter
    pub fn last_match_count(&self) -> usize {
        self.last_match_count
    }

    pub fn region_codes(&self) -> &RegionCodeMap {
        &self.region_codes
    }

    /// Classification codes carried by the events, in event order
    pub fn codes(&self) -> impl Iterator<Item = ClassificationCode> + '_ {
        self.events.iter().filter_map(|e| e.code)
    }

    pub(crate) fn set_annotated(&mut self, summary: AnnotationSummary, region_codes: RegionCodeMap) {
        self.annotation = Some(summary);
        self.region_codes = region_codes;
    }

    pub(crate) fn mark_unannotated(&mut self) {
        self.annotation = None;
        for event in &mut self.events {
            event.clear_derived();
        }
    }

    pub(crate) fn record_filter(&mut self, spec: FilterSpec, region_codes: RegionCodeMap, outcome: &FilterOutcome) {
        self.filters_applied = outcome.filter_index;
        self.last_match_count = outcome.matched;
        self.region_codes = region_codes;
        self.applied.push(AppliedFilter {
            index: outcome.filter_index,
            spec,
            matched: outcome.matched,
            conflicts: outcome.conflicts.len(),
        });
    }

    /// Drop every classification so the filter sequence can start over
    ///
    /// Labels written by the filters are undone; terminal-region labels from
    /// annotation stay.
    pub fn reset_filters(&mut self) {
        for event in &mut self.events {
            event.declassify();
        }
        self.filters_applied = 0;
        self.applied.clear();
        self.last_match_count = 0;
        self.region_codes.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    #[test]
    fn test_from_records() {
        let fields = FieldBindings::default();
        let records: Vec<RawRecord> = [("T_START", None), ("R_fixation", Some(120.0)), ("T_END", None)]
            .iter()
            .map(|(label, x)| {
                let mut record = RawRecord::new();
                record.insert("type".into(), FieldValue::Text(label.to_string()));
                if let Some(x) = x {
                    record.insert("fix_avgpos_x".into(), FieldValue::Number(*x));
                }
                record
            })
            .collect();

        let dataset = Dataset::from_records("p01", &records, &fields);
        assert_eq!(dataset.name(), "p01");
        assert_eq!(dataset.len(), 3);
        assert!(dataset.events()[1].is_fixation());
        assert!(!dataset.is_annotated());
        assert_eq!(dataset.filters_applied(), 0);
    }

    #[test]
    fn test_reset_filters_restores_labels() {
        let mut event = Event::fixation("R_fixation", 10.0);
        event.relabel("Ending_NoReg");
        event.classify("010201".parse().unwrap());
        let mut dataset = Dataset::from_events("p02", vec![event, Event::marker("T_END")]);

        assert_eq!(dataset.events()[0].label, "010201");
        assert_eq!(dataset.codes().count(), 1);

        dataset.reset_filters();
        let event = &dataset.events()[0];
        assert_eq!(event.label, "Ending_NoReg");
        assert_eq!(event.original_label.as_deref(), Some("R_fixation"));
        assert!(event.code.is_none());
        assert_eq!(dataset.codes().count(), 0);
    }
}
