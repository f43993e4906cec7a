//! Stimulus boundary tables
//!
//! The engine resolves fixation positions against region/word boundaries
//! supplied through the [`BoundaryLookup`] trait. [`BoundaryTable`] is the
//! in-memory implementation; [`FixedPitchLayout`] builds layouts for
//! sentences rendered in a monospaced font.

pub mod layout;
pub mod table;

// Re-export key types for convenience
pub use layout::FixedPitchLayout;
pub use table::{
    BoundaryLookup, BoundaryTable, LayoutEntry, PixelSpan, RegionBounds, StimulusLayout,
    WordBounds, WordHit,
};
