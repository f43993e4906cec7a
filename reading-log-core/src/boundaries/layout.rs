//! Fixed-pitch word layout
//!
//! Builds a [`StimulusLayout`] from region texts rendered in a monospaced
//! font: every character is `pixels_per_char` wide and the sentence starts
//! `offset_px` from the left edge of the screen. The space in front of a word
//! belongs to that word, so consecutive word spans touch and a fixation on a
//! space counts towards the following word.

use super::table::{PixelSpan, RegionBounds, StimulusLayout, WordBounds};
use crate::types::{EngineError, Result, WordKey};
use serde::{Deserialize, Serialize};

/// Monospaced sentence geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPitchLayout {
    /// Left screen offset of the first character, in pixels
    pub offset_px: f64,
    /// Width of one character, in pixels
    pub pixels_per_char: f64,
}

impl Default for FixedPitchLayout {
    fn default() -> Self {
        Self {
            offset_px: 281.0,
            pixels_per_char: 14.0,
        }
    }
}

impl FixedPitchLayout {
    pub fn new(offset_px: f64, pixels_per_char: f64) -> Self {
        Self {
            offset_px,
            pixels_per_char,
        }
    }

    /// Lay out `(region name, region text)` pairs left to right
    ///
    /// Regions are numbered from 1 in the given order and words from 1
    /// within each region. A region without words keeps its index but gets
    /// no entry in the layout.
    pub fn build<N, T>(&self, regions: &[(N, T)]) -> Result<StimulusLayout>
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        if !(self.pixels_per_char > 0.0) || !self.offset_px.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "invalid fixed-pitch geometry: offset {} px, {} px per character",
                self.offset_px, self.pixels_per_char
            )));
        }

        let mut cursor = self.offset_px;
        let mut leading_space = 0usize;
        let mut bounds = Vec::new();

        for (position, (name, text)) in regions.iter().enumerate() {
            let index = position as u32 + 1;
            let mut words = Vec::new();

            for (word_pos, word) in text.as_ref().split_whitespace().enumerate() {
                let width = (word.chars().count() + leading_space) as f64 * self.pixels_per_char;
                words.push(WordBounds {
                    key: WordKey::new(index, word_pos as u32 + 1),
                    span: PixelSpan::new(cursor, cursor + width),
                });
                cursor += width;
                leading_space = 1;
            }

            if words.is_empty() {
                log::debug!("Region '{}' has no words; skipped", name.as_ref());
                continue;
            }

            bounds.push(RegionBounds {
                index,
                name: name.as_ref().to_string(),
                span: None,
                words,
            });
        }

        StimulusLayout::new(bounds)
    }
}
