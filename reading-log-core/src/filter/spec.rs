//! Filter specifications
//!
//! A [`FilterSpec`] is one declarative set of criteria. Every option
//! criterion is an [`OptionSet`]: selected values are ORed, criteria are
//! ANDed. Configuration may give each criterion as a single value or a
//! list, by name or by the numeric codes of the legacy dialogs; both are
//! normalized into a set when deserialized.

use crate::types::{EngineError, ReadingAnnotation, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A scalar or a list, as accepted in configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Deserialize a scalar or a list into a list
fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::deserialize(deserializer).map(Vec::from)
}

/// Enumerated filter options
pub trait FilterOption: Copy + Ord + fmt::Display + Serialize + DeserializeOwned + 'static {
    /// Names in legacy numeric order (the first one, code 1, is the wildcard)
    const NAMES: &'static [(&'static str, Self)];

    fn is_any(&self) -> bool {
        *self == Self::NAMES[0].1
    }
}

/// Raw option as written in configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OptionRepr {
    Code(u32),
    Name(String),
}

fn parse_option<T: FilterOption>(repr: OptionRepr) -> std::result::Result<T, String> {
    match repr {
        OptionRepr::Code(code) => T::NAMES
            .get((code as usize).wrapping_sub(1))
            .map(|(_, value)| *value)
            .ok_or_else(|| format!("unknown option code {}", code)),
        OptionRepr::Name(name) => {
            let wanted = name.trim().to_lowercase().replace([' ', '-'], "_");
            T::NAMES
                .iter()
                .find(|(n, _)| *n == wanted)
                .map(|(_, value)| *value)
                .ok_or_else(|| format!("unknown option '{}'", name))
        }
    }
}

/// A set of selected options; empty or containing the wildcard means "any"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet<T: FilterOption>(#[serde(deserialize_with = "one_or_many_set")] BTreeSet<T>);

fn one_or_many_set<'de, D, T>(deserializer: D) -> std::result::Result<BTreeSet<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Ord,
{
    one_or_many(deserializer).map(|v: Vec<T>| v.into_iter().collect())
}

impl<T: FilterOption> OptionSet<T> {
    pub fn any() -> Self {
        Self(BTreeSet::new())
    }

    pub fn only(option: T) -> Self {
        Self(BTreeSet::from([option]))
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty() || self.0.iter().any(FilterOption::is_any)
    }

    /// True if any selected option accepts, or the set is a wildcard
    pub fn accepts(&self, test: impl Fn(T) -> bool) -> bool {
        self.is_any() || self.0.iter().any(|option| test(*option))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: FilterOption> Default for OptionSet<T> {
    fn default() -> Self {
        Self::any()
    }
}

impl<T: FilterOption> FromIterator<T> for OptionSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: FilterOption> fmt::Display for OptionSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return write!(f, "any");
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" or "))
    }
}

/// Which visit of the region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "OptionRepr")]
pub enum PassOption {
    Any,
    FirstPass,
    SecondPass,
    ThirdPassPlus,
}

impl FilterOption for PassOption {
    const NAMES: &'static [(&'static str, Self)] = &[
        ("any", PassOption::Any),
        ("first_pass", PassOption::FirstPass),
        ("second_pass", PassOption::SecondPass),
        ("third_pass_plus", PassOption::ThirdPassPlus),
    ];
}

impl PassOption {
    pub fn matches(self, pass: u32) -> bool {
        match self {
            PassOption::Any => true,
            PassOption::FirstPass => pass == 1,
            PassOption::SecondPass => pass == 2,
            PassOption::ThirdPassPlus => pass >= 3,
        }
    }
}

impl fmt::Display for PassOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassOption::Any => write!(f, "any pass"),
            PassOption::FirstPass => write!(f, "first pass"),
            PassOption::SecondPass => write!(f, "second pass"),
            PassOption::ThirdPassPlus => write!(f, "third pass and beyond"),
        }
    }
}

/// Position of the fixation within its pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "OptionRepr")]
pub enum FixationType {
    Any,
    Single,
    FirstOfMultiple,
    Second,
    BeyondSecond,
    Last,
}

impl FilterOption for FixationType {
    const NAMES: &'static [(&'static str, Self)] = &[
        ("any", FixationType::Any),
        ("single", FixationType::Single),
        ("first_of_multiple", FixationType::FirstOfMultiple),
        ("second", FixationType::Second),
        ("beyond_second", FixationType::BeyondSecond),
        ("last", FixationType::Last),
    ];
}

impl FixationType {
    /// `index` is the 1-based fixation-in-pass, `pass_size` the size of its pass
    pub fn matches(self, index: u32, pass_size: u32) -> bool {
        match self {
            FixationType::Any => true,
            FixationType::Single => pass_size == 1,
            FixationType::FirstOfMultiple => index == 1 && pass_size > 1,
            FixationType::Second => index == 2,
            FixationType::BeyondSecond => index > 2,
            FixationType::Last => index == pass_size,
        }
    }
}

impl fmt::Display for FixationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixationType::Any => write!(f, "any fixation"),
            FixationType::Single => write!(f, "single fixation"),
            FixationType::FirstOfMultiple => write!(f, "first of multiple"),
            FixationType::Second => write!(f, "second fixation"),
            FixationType::BeyondSecond => write!(f, "beyond second"),
            FixationType::Last => write!(f, "last in pass"),
        }
    }
}

/// Direction of the saccade into or out of a fixation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "OptionRepr")]
pub enum SaccadeDirection {
    Any,
    Forward,
    Backward,
}

impl FilterOption for SaccadeDirection {
    const NAMES: &'static [(&'static str, Self)] = &[
        ("any", SaccadeDirection::Any),
        ("forward", SaccadeDirection::Forward),
        ("backward", SaccadeDirection::Backward),
    ];
}

impl SaccadeDirection {
    pub fn matches(self, heading: SaccadeHeading) -> bool {
        match self {
            SaccadeDirection::Any => true,
            SaccadeDirection::Forward => heading == SaccadeHeading::Forward,
            SaccadeDirection::Backward => heading == SaccadeHeading::Backward,
        }
    }
}

impl fmt::Display for SaccadeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaccadeDirection::Any => write!(f, "any direction"),
            SaccadeDirection::Forward => write!(f, "forward"),
            SaccadeDirection::Backward => write!(f, "backward"),
        }
    }
}

macro_rules! option_try_from {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<OptionRepr> for $ty {
                type Error = String;

                fn try_from(repr: OptionRepr) -> std::result::Result<Self, String> {
                    parse_option(repr)
                }
            }
        )*
    };
}

option_try_from!(PassOption, FixationType, SaccadeDirection);

/// Minimum horizontal displacement, in pixels, for a saccade to have a direction
pub const SACCADE_DIRECTION_THRESHOLD_PX: f64 = 10.0;

/// Observed direction of an adjacent saccade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaccadeHeading {
    Forward,
    Backward,
    /// Below threshold, missing coordinates or no saccade found
    Unclear,
}

impl SaccadeHeading {
    pub fn from_displacement(dx: Option<f64>) -> Self {
        match dx {
            Some(dx) if dx > SACCADE_DIRECTION_THRESHOLD_PX => SaccadeHeading::Forward,
            Some(dx) if dx < -SACCADE_DIRECTION_THRESHOLD_PX => SaccadeHeading::Backward,
            _ => SaccadeHeading::Unclear,
        }
    }
}

/// What the predicate needs to know about one fixation
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub reading: &'a ReadingAnnotation,
    pub pass_size: u32,
    pub saccade_in: SaccadeHeading,
    pub saccade_out: SaccadeHeading,
}

/// One application of the filter engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Region names; at least one is required
    #[serde(deserialize_with = "one_or_many")]
    pub regions: Vec<String>,
    #[serde(default)]
    pub pass: OptionSet<PassOption>,
    /// Region visited before the current pass (empty = any)
    #[serde(default, deserialize_with = "one_or_many")]
    pub previous_regions: Vec<String>,
    /// Region visited after the current pass (empty = any)
    #[serde(default, deserialize_with = "one_or_many")]
    pub next_regions: Vec<String>,
    #[serde(default)]
    pub fixation_type: OptionSet<FixationType>,
    #[serde(default)]
    pub saccade_in: OptionSet<SaccadeDirection>,
    #[serde(default)]
    pub saccade_out: OptionSet<SaccadeDirection>,
}

impl FilterSpec {
    /// A spec selecting every fixation in the given regions
    pub fn for_regions<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            pass: OptionSet::any(),
            previous_regions: Vec::new(),
            next_regions: Vec::new(),
            fixation_type: OptionSet::any(),
            saccade_in: OptionSet::any(),
            saccade_out: OptionSet::any(),
        }
    }

    /// Builder method: restrict the pass
    pub fn with_pass(mut self, options: impl IntoIterator<Item = PassOption>) -> Self {
        self.pass = options.into_iter().collect();
        self
    }

    /// Builder method: restrict the region visited before the pass
    pub fn with_previous_regions<S: Into<String>>(mut self, regions: impl IntoIterator<Item = S>) -> Self {
        self.previous_regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: restrict the region visited after the pass
    pub fn with_next_regions<S: Into<String>>(mut self, regions: impl IntoIterator<Item = S>) -> Self {
        self.next_regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: restrict the fixation type
    pub fn with_fixation_type(mut self, options: impl IntoIterator<Item = FixationType>) -> Self {
        self.fixation_type = options.into_iter().collect();
        self
    }

    /// Builder method: restrict the incoming saccade direction
    pub fn with_saccade_in(mut self, options: impl IntoIterator<Item = SaccadeDirection>) -> Self {
        self.saccade_in = options.into_iter().collect();
        self
    }

    /// Builder method: restrict the outgoing saccade direction
    pub fn with_saccade_out(mut self, options: impl IntoIterator<Item = SaccadeDirection>) -> Self {
        self.saccade_out = options.into_iter().collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.regions.iter().all(|r| r.trim().is_empty()) {
            return Err(EngineError::InvalidFilter(
                "at least one region must be selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Evaluate every criterion against one fixation
    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        let reading = candidate.reading;

        self.regions.iter().any(|r| *r == reading.region.name)
            && self.pass.accepts(|p| p.matches(reading.region_pass))
            && region_criterion(&self.previous_regions, reading.last_region_visited.as_ref().map(|r| r.name.as_str()))
            && region_criterion(&self.next_regions, reading.next_region_visited.as_ref().map(|r| r.name.as_str()))
            && self
                .fixation_type
                .accepts(|t| t.matches(reading.fixation_in_pass, candidate.pass_size))
            && self.saccade_in.accepts(|d| d.matches(candidate.saccade_in))
            && self.saccade_out.accepts(|d| d.matches(candidate.saccade_out))
    }

    /// Human-readable summary used in bin descriptions
    pub fn describe(&self) -> String {
        let regions = |set: &[String]| {
            if set.is_empty() {
                "any".to_string()
            } else {
                set.join(" or ")
            }
        };
        format!(
            "{}; {}; previous region {}; next region {}; {}; saccade in {}; saccade out {}",
            self.regions.join(" or "),
            self.pass,
            regions(&self.previous_regions),
            regions(&self.next_regions),
            self.fixation_type,
            self.saccade_in,
            self.saccade_out
        )
    }
}

fn region_criterion(selected: &[String], region: Option<&str>) -> bool {
    selected.is_empty() || region.is_some_and(|name| selected.iter().any(|s| s == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RegionRef, WordKey};

    fn reading(region: &str, pass: u32, index: u32) -> ReadingAnnotation {
        ReadingAnnotation {
            word: WordKey::new(2, 1),
            region: RegionRef::new(2, region),
            previous_word: None,
            previous_region: None,
            last_region_visited: Some(RegionRef::new(1, "Pretarget")),
            next_region_visited: Some(RegionRef::new(3, "Ending")),
            region_pass: pass,
            fixation_in_pass: index,
            first_pass_region: false,
            first_pass_word: false,
            word_fixation_count: 1,
            region_fixation_count: 1,
            word_regression: false,
            region_regression: false,
        }
    }

    fn candidate(reading: &ReadingAnnotation, pass_size: u32) -> Candidate<'_> {
        Candidate {
            reading,
            pass_size,
            saccade_in: SaccadeHeading::Forward,
            saccade_out: SaccadeHeading::Unclear,
        }
    }

    #[test]
    fn test_pass_options() {
        assert!(PassOption::FirstPass.matches(1));
        assert!(!PassOption::FirstPass.matches(2));
        assert!(PassOption::SecondPass.matches(2));
        assert!(PassOption::ThirdPassPlus.matches(5));
        assert!(PassOption::Any.matches(9));
    }

    #[test]
    fn test_fixation_types() {
        assert!(FixationType::Single.matches(1, 1));
        assert!(!FixationType::FirstOfMultiple.matches(1, 1));
        assert!(FixationType::FirstOfMultiple.matches(1, 3));
        assert!(FixationType::Second.matches(2, 3));
        assert!(FixationType::BeyondSecond.matches(3, 3));
        assert!(FixationType::Last.matches(3, 3));
        assert!(FixationType::Last.matches(1, 1));
        assert!(!FixationType::Last.matches(2, 3));
    }

    #[test]
    fn test_saccade_threshold() {
        assert_eq!(SaccadeHeading::from_displacement(Some(10.5)), SaccadeHeading::Forward);
        assert_eq!(SaccadeHeading::from_displacement(Some(-11.0)), SaccadeHeading::Backward);
        assert_eq!(SaccadeHeading::from_displacement(Some(10.0)), SaccadeHeading::Unclear);
        assert_eq!(SaccadeHeading::from_displacement(Some(-3.0)), SaccadeHeading::Unclear);
        assert_eq!(SaccadeHeading::from_displacement(None), SaccadeHeading::Unclear);

        assert!(SaccadeDirection::Any.matches(SaccadeHeading::Unclear));
        assert!(!SaccadeDirection::Forward.matches(SaccadeHeading::Unclear));
    }

    #[test]
    fn test_criteria_are_anded_options_ored() {
        let r = reading("Target", 2, 1);
        let c = candidate(&r, 2);

        let spec = FilterSpec::for_regions(["Target"]);
        assert!(spec.matches(&c));

        let spec = FilterSpec::for_regions(["Target"]).with_pass([PassOption::FirstPass]);
        assert!(!spec.matches(&c));

        let spec = FilterSpec::for_regions(["Target"])
            .with_pass([PassOption::FirstPass, PassOption::SecondPass])
            .with_fixation_type([FixationType::FirstOfMultiple]);
        assert!(spec.matches(&c));

        let spec = FilterSpec::for_regions(["Pretarget", "Target"]).with_saccade_out([SaccadeDirection::Forward]);
        assert!(!spec.matches(&c));

        let spec = FilterSpec::for_regions(["Target"]).with_saccade_in([SaccadeDirection::Forward]);
        assert!(spec.matches(&c));
    }

    #[test]
    fn test_adjacent_region_criteria() {
        let r = reading("Target", 1, 1);
        let c = candidate(&r, 1);

        let spec = FilterSpec::for_regions(["Target"]).with_previous_regions(["Pretarget"]);
        assert!(spec.matches(&c));
        let spec = FilterSpec::for_regions(["Target"]).with_next_regions(["Pretarget"]);
        assert!(!spec.matches(&c));

        let mut first = reading("Target", 1, 1);
        first.last_region_visited = None;
        let c = candidate(&first, 1);
        let spec = FilterSpec::for_regions(["Target"]).with_previous_regions(["Pretarget"]);
        assert!(!spec.matches(&c));
    }

    #[test]
    fn test_empty_region_set_rejected() {
        let spec = FilterSpec::for_regions(Vec::<String>::new());
        assert!(matches!(spec.validate(), Err(EngineError::InvalidFilter(_))));
        assert!(FilterSpec::for_regions(["Target"]).validate().is_ok());
    }

    #[test]
    fn test_scalar_and_legacy_options() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{
                "regions": "Target",
                "pass": "first_pass",
                "fixation_type": [2, "last"],
                "saccade_in": 3,
                "next_regions": ["Ending"]
            }"#,
        )
        .unwrap();

        assert_eq!(spec.regions, vec!["Target".to_string()]);
        assert_eq!(spec.pass, OptionSet::only(PassOption::FirstPass));
        assert_eq!(
            spec.fixation_type,
            [FixationType::Single, FixationType::Last].into_iter().collect::<OptionSet<_>>()
        );
        assert_eq!(spec.saccade_in, OptionSet::only(SaccadeDirection::Backward));
        assert!(spec.saccade_out.is_any());

        let bad = serde_json::from_str::<FilterSpec>(r#"{"regions": "A", "pass": 9}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_describe() {
        let spec = FilterSpec::for_regions(["Target"])
            .with_pass([PassOption::FirstPass])
            .with_next_regions(["Ending"])
            .with_saccade_in([SaccadeDirection::Forward, SaccadeDirection::Backward]);
        assert_eq!(
            spec.describe(),
            "Target; first pass; previous region any; next region Ending; any; \
             saccade in forward or backward; saccade out any"
        );
    }
}
