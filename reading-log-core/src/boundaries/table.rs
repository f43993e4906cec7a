//! Region and word boundary tables
//!
//! Boundary tables are produced outside the engine (from the stimulus text
//! layout) and consumed read-only: one [`StimulusLayout`] per
//! (condition, item) pair.

use crate::types::{EngineError, Result, WordKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of stimulus layouts, keyed by (condition, item)
pub trait BoundaryLookup {
    /// Layout shown for the given condition and item, if known
    fn layout(&self, condition: u32, item: u32) -> Option<&StimulusLayout>;
}

/// A half-open pixel interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSpan {
    pub start: f64,
    pub end: f64,
}

impl PixelSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.start <= x && x < self.end
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() || self.end < self.start {
            return Err(EngineError::InvalidBoundaries(format!(
                "{} has an invalid span [{}, {})",
                what, self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Boundaries of one word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBounds {
    pub key: WordKey,
    #[serde(flatten)]
    pub span: PixelSpan,
}

/// Boundaries of one region and its words
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub index: u32,
    pub name: String,
    /// Region extent; derived from the words when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<PixelSpan>,
    #[serde(default)]
    pub words: Vec<WordBounds>,
}

/// Result of resolving a horizontal position against a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordHit {
    Word(WordKey),
    /// Left of the first word
    LeftOfText,
    /// At or right of the end of the last word
    RightOfText,
    /// Inside the text extent but between word spans
    Gap,
}

/// Region and word boundaries of one stimulus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RegionBounds>", into = "Vec<RegionBounds>")]
pub struct StimulusLayout {
    regions: Vec<RegionBounds>,
    /// All words in ascending (region, word) order
    words: Vec<WordBounds>,
}

impl StimulusLayout {
    /// Build a layout, validating indices, word keys and spans
    pub fn new(mut regions: Vec<RegionBounds>) -> Result<Self> {
        regions.sort_by_key(|r| r.index);

        let mut words = Vec::new();
        for pair in regions.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(EngineError::InvalidBoundaries(format!(
                    "region index {} is used twice",
                    pair[0].index
                )));
            }
        }

        for region in &mut regions {
            if region.index == 0 {
                return Err(EngineError::InvalidBoundaries(format!(
                    "region '{}' has index 0; indices start at 1",
                    region.name
                )));
            }
            for word in &region.words {
                if word.key.region != region.index {
                    return Err(EngineError::InvalidBoundaries(format!(
                        "word {} is listed under region {} ('{}')",
                        word.key, region.index, region.name
                    )));
                }
                word.span.validate(&format!("word {}", word.key))?;
                words.push(word.clone());
            }

            if region.span.is_none() {
                region.span = Self::extent(&region.words);
            }
            if let Some(span) = &region.span {
                span.validate(&format!("region '{}'", region.name))?;
            }
        }

        words.sort_by_key(|w| w.key);
        for pair in words.windows(2) {
            if pair[0].key == pair[1].key {
                return Err(EngineError::InvalidBoundaries(format!(
                    "word {} is defined twice",
                    pair[0].key
                )));
            }
        }

        Ok(Self { regions, words })
    }

    fn extent(words: &[WordBounds]) -> Option<PixelSpan> {
        let start = words.iter().map(|w| w.span.start).reduce(f64::min)?;
        let end = words.iter().map(|w| w.span.end).reduce(f64::max)?;
        Some(PixelSpan::new(start, end))
    }

    /// Resolve a horizontal position to the first word (ascending key) containing it
    pub fn resolve(&self, x: f64) -> WordHit {
        if let Some(word) = self.words.iter().find(|w| w.span.contains(x)) {
            return WordHit::Word(word.key);
        }
        match Self::extent(&self.words) {
            Some(extent) if x < extent.start => WordHit::LeftOfText,
            Some(extent) if x >= extent.end => WordHit::RightOfText,
            Some(_) => WordHit::Gap,
            None => WordHit::Gap,
        }
    }

    /// Region by index
    pub fn region(&self, index: u32) -> Option<&RegionBounds> {
        self.regions
            .binary_search_by_key(&index, |r| r.index)
            .ok()
            .map(|pos| &self.regions[pos])
    }

    /// Regions in ascending index order
    pub fn regions(&self) -> &[RegionBounds] {
        &self.regions
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

impl TryFrom<Vec<RegionBounds>> for StimulusLayout {
    type Error = EngineError;

    fn try_from(regions: Vec<RegionBounds>) -> Result<Self> {
        Self::new(regions)
    }
}

impl From<StimulusLayout> for Vec<RegionBounds> {
    fn from(layout: StimulusLayout) -> Self {
        layout.regions
    }
}

/// One entry of a serialized boundary table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub condition: u32,
    pub item: u32,
    pub regions: StimulusLayout,
}

/// In-memory boundary lookup keyed by (condition, item)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<LayoutEntry>", into = "Vec<LayoutEntry>")]
pub struct BoundaryTable {
    layouts: HashMap<(u32, u32), StimulusLayout>,
}

impl BoundaryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the layout for a condition and item
    pub fn insert(&mut self, condition: u32, item: u32, layout: StimulusLayout) {
        if self.layouts.insert((condition, item), layout).is_some() {
            log::warn!(
                "Boundary table: layout for condition {} item {} replaced",
                condition,
                item
            );
        }
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// All (condition, item) keys, sorted
    pub fn keys(&self) -> Vec<(u32, u32)> {
        let mut keys: Vec<_> = self.layouts.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl BoundaryLookup for BoundaryTable {
    fn layout(&self, condition: u32, item: u32) -> Option<&StimulusLayout> {
        self.layouts.get(&(condition, item))
    }
}

impl From<Vec<LayoutEntry>> for BoundaryTable {
    fn from(entries: Vec<LayoutEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry.condition, entry.item, entry.regions);
        }
        table
    }
}

impl From<BoundaryTable> for Vec<LayoutEntry> {
    fn from(table: BoundaryTable) -> Self {
        let mut entries: Vec<LayoutEntry> = table
            .layouts
            .into_iter()
            .map(|((condition, item), regions)| LayoutEntry {
                condition,
                item,
                regions,
            })
            .collect();
        entries.sort_by_key(|e| (e.condition, e.item));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(key: &str, start: f64, end: f64) -> WordBounds {
        WordBounds {
            key: key.parse().unwrap(),
            span: PixelSpan::new(start, end),
        }
    }

    fn two_region_layout() -> StimulusLayout {
        StimulusLayout::new(vec![
            RegionBounds {
                index: 2,
                name: "B".to_string(),
                span: None,
                words: vec![word("2.1", 50.0, 100.0)],
            },
            RegionBounds {
                index: 1,
                name: "A".to_string(),
                span: Some(PixelSpan::new(0.0, 50.0)),
                words: vec![word("1.1", 0.0, 30.0), word("1.2", 30.0, 50.0)],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_half_open_spans() {
        let layout = two_region_layout();
        assert_eq!(layout.resolve(0.0), WordHit::Word(WordKey::new(1, 1)));
        assert_eq!(layout.resolve(30.0), WordHit::Word(WordKey::new(1, 2)));
        assert_eq!(layout.resolve(50.0), WordHit::Word(WordKey::new(2, 1)));
        assert_eq!(layout.resolve(-1.0), WordHit::LeftOfText);
        assert_eq!(layout.resolve(100.0), WordHit::RightOfText);
    }

    #[test]
    fn test_gap_between_words() {
        let layout = StimulusLayout::new(vec![RegionBounds {
            index: 1,
            name: "A".to_string(),
            span: None,
            words: vec![word("1.1", 0.0, 10.0), word("1.2", 20.0, 30.0)],
        }])
        .unwrap();
        assert_eq!(layout.resolve(15.0), WordHit::Gap);
    }

    #[test]
    fn test_region_span_derived_from_words() {
        let layout = two_region_layout();
        let region = layout.region(2).unwrap();
        assert_eq!(region.name, "B");
        assert_eq!(region.span, Some(PixelSpan::new(50.0, 100.0)));
        assert!(layout.region(3).is_none());
        assert_eq!(layout.word_count(), 3);
    }

    #[test]
    fn test_word_under_wrong_region() {
        let result = StimulusLayout::new(vec![RegionBounds {
            index: 1,
            name: "A".to_string(),
            span: None,
            words: vec![word("2.1", 0.0, 10.0)],
        }]);
        assert!(matches!(result, Err(EngineError::InvalidBoundaries(_))));
    }

    #[test]
    fn test_duplicate_region_index() {
        let region = RegionBounds {
            index: 1,
            name: "A".to_string(),
            span: None,
            words: vec![],
        };
        assert!(StimulusLayout::new(vec![region.clone(), region]).is_err());
    }

    #[test]
    fn test_table_lookup() {
        let mut table = BoundaryTable::new();
        table.insert(1, 1, two_region_layout());
        table.insert(2, 1, two_region_layout());

        assert_eq!(table.len(), 2);
        assert!(table.layout(1, 1).is_some());
        assert!(table.layout(1, 2).is_none());
        assert_eq!(table.keys(), vec![(1, 1), (2, 1)]);
    }
}
