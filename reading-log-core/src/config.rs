//! Engine configuration types
//!
//! The engine needs three things from its caller: which record fields carry
//! the label and the fixation/saccade coordinates, which labels act as trial
//! and stimulus triggers, and which region (if any) is tracked as the
//! terminal region. Everything has serde defaults so the CLI can load it
//! straight from TOML.

use crate::types::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Normalize a label for comparison: trim and collapse internal whitespace
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Complete configuration of the annotation engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fields: FieldBindings,

    pub triggers: TriggerVocabulary,

    #[serde(default)]
    pub terminal: TerminalConfig,

    /// Explicit region name to code index map (empty = number by first appearance)
    #[serde(default)]
    pub region_codes: BTreeMap<String, u32>,
}

impl EngineConfig {
    /// Create a configuration with default field bindings for the given triggers
    pub fn new(triggers: TriggerVocabulary) -> Self {
        Self {
            triggers,
            ..Self::default()
        }
    }

    /// Builder method: replace the field bindings
    pub fn with_fields(mut self, fields: FieldBindings) -> Self {
        self.fields = fields;
        self
    }

    /// Builder method: track `region` as the terminal region
    pub fn with_terminal_region(mut self, region: impl Into<String>) -> Self {
        self.terminal.region = Some(region.into());
        self
    }

    /// Builder method: add an explicit region code
    pub fn add_region_code(mut self, region: impl Into<String>, code: u32) -> Self {
        self.region_codes.insert(region.into(), code);
        self
    }

    /// Check every binding and vocabulary entry before any event is touched
    pub fn validate(&self) -> Result<()> {
        self.fields.validate()?;
        self.triggers.validate()?;
        self.terminal.validate()?;

        for (region, code) in &self.region_codes {
            if !(1..=99).contains(code) {
                return Err(EngineError::InvalidConfig(format!(
                    "region code for '{}' must be within 1..=99, got {}",
                    region, code
                )));
            }
        }
        Ok(())
    }
}

/// Which record fields hold the label and coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBindings {
    #[serde(default = "default_label_field")]
    pub label_field: String,
    #[serde(default = "default_fixation_label")]
    pub fixation_label: String,
    #[serde(default = "default_saccade_label")]
    pub saccade_label: String,
    #[serde(default = "default_fixation_x")]
    pub fixation_x: String,
    #[serde(default)]
    pub fixation_y: Option<String>,
    #[serde(default = "default_saccade_start_x")]
    pub saccade_start_x: String,
    #[serde(default = "default_saccade_end_x")]
    pub saccade_end_x: String,
    #[serde(default)]
    pub saccade_start_y: Option<String>,
    #[serde(default)]
    pub saccade_end_y: Option<String>,
}

fn default_label_field() -> String {
    "type".to_string()
}

fn default_fixation_label() -> String {
    "R_fixation".to_string()
}

fn default_saccade_label() -> String {
    "R_saccade".to_string()
}

fn default_fixation_x() -> String {
    "fix_avgpos_x".to_string()
}

fn default_saccade_start_x() -> String {
    "sac_startpos_x".to_string()
}

fn default_saccade_end_x() -> String {
    "sac_endpos_x".to_string()
}

impl Default for FieldBindings {
    fn default() -> Self {
        Self {
            label_field: default_label_field(),
            fixation_label: default_fixation_label(),
            saccade_label: default_saccade_label(),
            fixation_x: default_fixation_x(),
            fixation_y: Some("fix_avgpos_y".to_string()),
            saccade_start_x: default_saccade_start_x(),
            saccade_end_x: default_saccade_end_x(),
            saccade_start_y: Some("sac_startpos_y".to_string()),
            saccade_end_y: Some("sac_endpos_y".to_string()),
        }
    }
}

impl FieldBindings {
    fn validate(&self) -> Result<()> {
        let required = [
            ("label_field", &self.label_field),
            ("fixation_label", &self.fixation_label),
            ("saccade_label", &self.saccade_label),
            ("fixation_x", &self.fixation_x),
            ("saccade_start_x", &self.saccade_start_x),
            ("saccade_end_x", &self.saccade_end_x),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::InvalidConfig(format!(
                    "field binding '{}' must not be empty",
                    name
                )));
            }
        }
        if normalize_label(&self.fixation_label) == normalize_label(&self.saccade_label) {
            return Err(EngineError::InvalidConfig(
                "fixation and saccade labels must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trigger labels recognized by the trial scanner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerVocabulary {
    pub trial_start: String,
    pub trial_end: String,

    /// Condition trigger label to condition number
    #[serde(default)]
    pub conditions: BTreeMap<String, u32>,

    /// Item trigger label to item number
    #[serde(default)]
    pub items: BTreeMap<String, u32>,

    /// Optional sentence presentation window
    #[serde(default)]
    pub sentence_start: Option<String>,
    #[serde(default)]
    pub sentence_end: Option<String>,
}

impl TriggerVocabulary {
    /// Create a vocabulary with trial start/end labels
    pub fn new(trial_start: impl Into<String>, trial_end: impl Into<String>) -> Self {
        Self {
            trial_start: trial_start.into(),
            trial_end: trial_end.into(),
            ..Self::default()
        }
    }

    /// Builder method: add a condition trigger
    pub fn add_condition(mut self, label: impl Into<String>, number: u32) -> Self {
        self.conditions.insert(label.into(), number);
        self
    }

    /// Builder method: add an item trigger
    pub fn add_item(mut self, label: impl Into<String>, number: u32) -> Self {
        self.items.insert(label.into(), number);
        self
    }

    /// Builder method: gate annotation to a sentence presentation window
    pub fn with_sentence_markers(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.sentence_start = Some(start.into());
        self.sentence_end = Some(end.into());
        self
    }

    /// True when fixations are only annotated inside a sentence window
    pub fn is_gated(&self) -> bool {
        self.sentence_start.is_some() && self.sentence_end.is_some()
    }

    fn validate(&self) -> Result<()> {
        if normalize_label(&self.trial_start).is_empty() || normalize_label(&self.trial_end).is_empty() {
            return Err(EngineError::InvalidConfig(
                "trial start and end labels are required".to_string(),
            ));
        }
        if self.sentence_start.is_some() != self.sentence_end.is_some() {
            return Err(EngineError::InvalidConfig(
                "sentence start and end labels must be configured together".to_string(),
            ));
        }

        // Every label must map to exactly one marker
        let mut seen = HashSet::new();
        let labels = [&self.trial_start, &self.trial_end]
            .into_iter()
            .chain(self.conditions.keys())
            .chain(self.items.keys())
            .chain(self.sentence_start.iter())
            .chain(self.sentence_end.iter());
        for label in labels {
            let normalized = normalize_label(label);
            if normalized.is_empty() {
                return Err(EngineError::InvalidConfig("empty trigger label".to_string()));
            }
            if !seen.insert(normalized.clone()) {
                return Err(EngineError::InvalidConfig(format!(
                    "trigger label '{}' is configured more than once",
                    normalized
                )));
            }
        }
        Ok(())
    }
}

/// Terminal-region tracking and the labels it writes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Name of the terminal region (tracking disabled when absent)
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_no_regression_label")]
    pub no_regression_label: String,
    #[serde(default = "default_pre_regression_label")]
    pub pre_regression_label: String,
    #[serde(default = "default_triggering_label")]
    pub triggering_label: String,
}

fn default_no_regression_label() -> String {
    "Ending_NoReg".to_string()
}

fn default_pre_regression_label() -> String {
    "Ending_PreReg".to_string()
}

fn default_triggering_label() -> String {
    "Ending_RegTrigger".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            region: None,
            no_regression_label: default_no_regression_label(),
            pre_regression_label: default_pre_regression_label(),
            triggering_label: default_triggering_label(),
        }
    }
}

impl TerminalConfig {
    fn validate(&self) -> Result<()> {
        if self.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(EngineError::InvalidConfig(
                "terminal region name must not be empty".to_string(),
            ));
        }
        for label in [
            &self.no_regression_label,
            &self.pre_regression_label,
            &self.triggering_label,
        ] {
            if label.trim().is_empty() {
                return Err(EngineError::InvalidConfig(
                    "terminal labels must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> TriggerVocabulary {
        TriggerVocabulary::new("T_START", "T_END")
            .add_condition("C1", 1)
            .add_condition("C2", 2)
            .add_item("I1", 1)
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new(vocabulary())
            .with_terminal_region("Ending")
            .add_region_code("Target", 3);

        assert_eq!(config.terminal.region.as_deref(), Some("Ending"));
        assert_eq!(config.region_codes.get("Target"), Some(&3));
        assert_eq!(config.fields.fixation_x, "fix_avgpos_x");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_trial_markers() {
        let config = EngineConfig::new(TriggerVocabulary::new("", "T_END"));
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_duplicate_trigger_label() {
        let vocab = vocabulary().add_item(" C1 ", 7);
        let config = EngineConfig::new(vocab);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_half_configured_sentence_window() {
        let mut vocab = vocabulary();
        vocab.sentence_start = Some("S_ON".to_string());
        assert!(EngineConfig::new(vocab).validate().is_err());

        let gated = vocabulary().with_sentence_markers("S_ON", "S_OFF");
        assert!(gated.is_gated());
        assert!(EngineConfig::new(gated).validate().is_ok());
    }

    #[test]
    fn test_region_code_range() {
        let config = EngineConfig::new(vocabulary()).add_region_code("Ending", 100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_field_binding() {
        let mut fields = FieldBindings::default();
        fields.fixation_x = " ".to_string();
        let config = EngineConfig::new(vocabulary()).with_fields(fields);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  S  1 "), "S 1");
        assert_eq!(normalize_label("T_START"), "T_START");
    }
}
