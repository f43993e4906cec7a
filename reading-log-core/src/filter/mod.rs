//! Filter / classification engine
//!
//! Selects annotated fixations with a [`FilterSpec`] and relabels the
//! matches with a six-digit [`ClassificationCode`].

mod code;
mod engine;
mod index;
mod spec;

pub use code::{ClassificationCode, RegionCodeMap, MAX_CODE_FIELD};
pub use engine::{apply_filter, Conflict, FilterOutcome};
pub use index::FixationIndex;
pub use spec::{
    Candidate, FilterOption, FilterSpec, FixationType, OptionRepr, OptionSet, PassOption,
    SaccadeDirection, SaccadeHeading, SACCADE_DIRECTION_THRESHOLD_PX,
};
