//! Core types for the reading-log analyzer
//!
//! This module defines the event model shared by every stage of the engine.
//! Events start out as raw records bound through [`FieldBindings`]; the trial
//! scanner, the annotator and the filter engine then attach their derived
//! fields in place.
//!
//! [`FieldBindings`]: crate::config::FieldBindings

use crate::config::{normalize_label, FieldBindings};
use crate::filter::ClassificationCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the engine
///
/// Per-event data problems (missing coordinates, unknown stimulus keys) are
/// never reported through this type; such events are skipped and counted in
/// the [`AnnotationSummary`](crate::AnnotationSummary).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid boundary table: {0}")]
    InvalidBoundaries(String),

    #[error("Invalid word key: {0:?}")]
    InvalidWordKey(String),

    #[error("Dataset '{0}' has no region annotation")]
    NotAnnotated(String),

    #[error("Dataset '{0}' already carries classification codes")]
    AlreadyClassified(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Classification code overflow: {0}")]
    CodeOverflow(String),
}

/// One field value of a raw event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Empty,
}

impl FieldValue {
    /// Numeric view of the value; text is parsed, non-finite values are rejected
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Number(v) => *v,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Flag(_) | FieldValue::Empty => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Textual view of the value, used for labels
    ///
    /// Integral numbers print without a fractional part so that numeric
    /// trigger codes (`200.0`) match their configured spelling (`200`).
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            FieldValue::Number(v) => v.to_string(),
            FieldValue::Flag(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Empty => String::new(),
        }
    }
}

/// A raw event record: field name to value
pub type RawRecord = BTreeMap<String, FieldValue>;

/// Semantic payload of an event, fixed at ingest time
///
/// The payload survives relabeling, so a fixation stays a fixation after
/// its label has been replaced by a classification code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Fixation {
        x: Option<f64>,
        y: Option<f64>,
    },
    Saccade {
        start_x: Option<f64>,
        end_x: Option<f64>,
        start_y: Option<f64>,
        end_y: Option<f64>,
    },
    Marker,
}

impl EventPayload {
    /// Horizontal displacement (end-x minus start-x) of a saccade
    pub fn horizontal_displacement(&self) -> Option<f64> {
        match self {
            EventPayload::Saccade {
                start_x: Some(start),
                end_x: Some(end),
                ..
            } => Some(end - start),
            _ => None,
        }
    }
}

/// Trigger markers recognized by the trial scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "marker", content = "number", rename_all = "snake_case")]
pub enum Marker {
    TrialStart,
    TrialEnd,
    Condition(u32),
    Item(u32),
    SentenceStart,
    SentenceEnd,
}

/// Event kind as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TrialStart,
    TrialEnd,
    ConditionTrigger(u32),
    ItemTrigger(u32),
    SentenceStart,
    SentenceEnd,
    Fixation,
    Saccade,
    Other,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::TrialStart => write!(f, "trial-start"),
            EventKind::TrialEnd => write!(f, "trial-end"),
            EventKind::ConditionTrigger(n) => write!(f, "condition-trigger({})", n),
            EventKind::ItemTrigger(n) => write!(f, "item-trigger({})", n),
            EventKind::SentenceStart => write!(f, "sentence-start"),
            EventKind::SentenceEnd => write!(f, "sentence-end"),
            EventKind::Fixation => write!(f, "fixation"),
            EventKind::Saccade => write!(f, "saccade"),
            EventKind::Other => write!(f, "other"),
        }
    }
}

/// Trial state applicable at one event, written by the trial scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialContext {
    /// 1-based trial number
    pub trial: u32,
    /// Condition number, once its trigger has been seen in this trial
    pub condition: Option<u32>,
    /// Item number, once its trigger has been seen in this trial
    pub item: Option<u32>,
    /// False outside the sentence presentation window (when gating is configured)
    pub active: bool,
    /// Set on every event of a trial whose terminal region was left by a regression
    #[serde(default)]
    pub regression_trial: bool,
}

/// A word position: region index and word index within the region (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WordKey {
    pub region: u32,
    pub word: u32,
}

impl WordKey {
    pub fn new(region: u32, word: u32) -> Self {
        Self { region, word }
    }
}

impl FromStr for WordKey {
    type Err = EngineError;

    /// Parses `{region}.{word}` or `{region}_{word}`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (region, word) = trimmed
            .split_once('.')
            .or_else(|| trimmed.split_once('_'))
            .ok_or_else(|| EngineError::InvalidWordKey(s.to_string()))?;

        let parse = |part: &str| -> Result<u32> {
            match part.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(EngineError::InvalidWordKey(s.to_string())),
            }
        };

        Ok(Self::new(parse(region)?, parse(word)?))
    }
}

impl TryFrom<String> for WordKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<WordKey> for String {
    fn from(key: WordKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for WordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.region, self.word)
    }
}

/// A region by index and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionRef {
    pub index: u32,
    pub name: String,
}

impl RegionRef {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for RegionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.index)
    }
}

/// Reading-behavior fields derived for one fixation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingAnnotation {
    /// Word the fixation landed on
    pub word: WordKey,
    /// Region containing that word
    pub region: RegionRef,
    /// Word of the previous annotated fixation in this trial
    pub previous_word: Option<WordKey>,
    /// Region of the previous annotated fixation in this trial
    pub previous_region: Option<RegionRef>,
    /// Region visited right before the current pass started
    pub last_region_visited: Option<RegionRef>,
    /// Region visited right after the current pass ends (lookahead)
    pub next_region_visited: Option<RegionRef>,
    /// 1-based visit number of this region within the trial
    pub region_pass: u32,
    /// 1-based position of this fixation within its pass
    pub fixation_in_pass: u32,
    pub first_pass_region: bool,
    pub first_pass_word: bool,
    /// Fixations on this word so far, including this one
    pub word_fixation_count: u32,
    /// Fixations in this region so far, including this one
    pub region_fixation_count: u32,
    pub word_regression: bool,
    pub region_regression: bool,
}

/// One event of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Current label; replaced by terminal-region labels and classification codes
    pub label: String,
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial: Option<TrialContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<ReadingAnnotation>,
    /// Label before the first relabeling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ClassificationCode>,
    /// Label the classification code replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_filter_label: Option<String>,
}

impl Event {
    pub fn new(label: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            label: label.into(),
            payload,
            marker: None,
            trial: None,
            reading: None,
            original_label: None,
            code: None,
            pre_filter_label: None,
        }
    }

    /// A fixation at horizontal position `x`
    pub fn fixation(label: impl Into<String>, x: f64) -> Self {
        Self::new(label, EventPayload::Fixation { x: Some(x), y: None })
    }

    /// A saccade between two horizontal positions
    pub fn saccade(label: impl Into<String>, start_x: f64, end_x: f64) -> Self {
        Self::new(
            label,
            EventPayload::Saccade {
                start_x: Some(start_x),
                end_x: Some(end_x),
                start_y: None,
                end_y: None,
            },
        )
    }

    /// A trigger or any other non-oculomotor event
    pub fn marker(label: impl Into<String>) -> Self {
        Self::new(label, EventPayload::Marker)
    }

    /// Build an event from a raw record using the configured field bindings
    pub fn from_record(record: &RawRecord, fields: &FieldBindings) -> Self {
        let label = record
            .get(&fields.label_field)
            .map(FieldValue::as_text)
            .unwrap_or_default();
        let number = |name: &Option<String>| {
            name.as_ref()
                .and_then(|n| record.get(n))
                .and_then(FieldValue::as_f64)
        };
        let required = |name: &String| record.get(name).and_then(FieldValue::as_f64);

        let normalized = normalize_label(&label);
        let payload = if normalized == normalize_label(&fields.fixation_label) {
            EventPayload::Fixation {
                x: required(&fields.fixation_x),
                y: number(&fields.fixation_y),
            }
        } else if normalized == normalize_label(&fields.saccade_label) {
            EventPayload::Saccade {
                start_x: required(&fields.saccade_start_x),
                end_x: required(&fields.saccade_end_x),
                start_y: number(&fields.saccade_start_y),
                end_y: number(&fields.saccade_end_y),
            }
        } else {
            EventPayload::Marker
        };

        Self::new(label, payload)
    }

    /// Kind of this event, combining its payload with the scanner's marker
    pub fn kind(&self) -> EventKind {
        match (&self.payload, self.marker) {
            (EventPayload::Fixation { .. }, _) => EventKind::Fixation,
            (EventPayload::Saccade { .. }, _) => EventKind::Saccade,
            (EventPayload::Marker, Some(Marker::TrialStart)) => EventKind::TrialStart,
            (EventPayload::Marker, Some(Marker::TrialEnd)) => EventKind::TrialEnd,
            (EventPayload::Marker, Some(Marker::Condition(n))) => EventKind::ConditionTrigger(n),
            (EventPayload::Marker, Some(Marker::Item(n))) => EventKind::ItemTrigger(n),
            (EventPayload::Marker, Some(Marker::SentenceStart)) => EventKind::SentenceStart,
            (EventPayload::Marker, Some(Marker::SentenceEnd)) => EventKind::SentenceEnd,
            (EventPayload::Marker, None) => EventKind::Other,
        }
    }

    pub fn is_fixation(&self) -> bool {
        matches!(self.payload, EventPayload::Fixation { .. })
    }

    pub fn is_saccade(&self) -> bool {
        matches!(self.payload, EventPayload::Saccade { .. })
    }

    /// Horizontal fixation position, if this is a fixation with a valid x
    pub fn fixation_x(&self) -> Option<f64> {
        match self.payload {
            EventPayload::Fixation { x, .. } => x.filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn trial_number(&self) -> Option<u32> {
        self.trial.map(|t| t.trial)
    }

    /// Replace the label, keeping the pre-relabel label the first time
    pub fn relabel(&mut self, label: impl Into<String>) {
        if self.original_label.is_none() {
            self.original_label = Some(std::mem::take(&mut self.label));
        }
        self.label = label.into();
    }

    /// Stamp a classification code, relabeling the event with it
    pub fn classify(&mut self, code: ClassificationCode) {
        self.pre_filter_label = Some(self.label.clone());
        self.code = Some(code);
        self.relabel(code.to_string());
    }

    /// Drop the classification code and restore the label it replaced
    pub fn declassify(&mut self) {
        if self.code.take().is_some() {
            if let Some(label) = self.pre_filter_label.take() {
                self.label = label;
            }
        }
    }

    /// Put the original label back and drop every derived field
    pub(crate) fn clear_derived(&mut self) {
        if let Some(original) = self.original_label.take() {
            self.label = original;
        }
        self.marker = None;
        self.trial = None;
        self.reading = None;
        self.code = None;
        self.pre_filter_label = None;
    }
}
