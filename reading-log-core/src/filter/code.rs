//! Classification codes
//!
//! A code is six digits: condition (mod 100), region code index and filter
//! sequence index, two digits each. Region code indices come from a
//! [`RegionCodeMap`], either configured explicitly or numbered in order of
//! first appearance across the applied filters.

use crate::types::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Largest value a two-digit code field can hold
pub const MAX_CODE_FIELD: u32 = 99;

/// A six-digit classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassificationCode {
    condition: u8,
    region: u8,
    filter: u8,
}

impl ClassificationCode {
    /// Derive the code for a fixation
    ///
    /// The condition wraps modulo 100 and an absent condition or region
    /// becomes `00`; region and filter indices above 99 are rejected.
    pub fn derive(condition: Option<u32>, region: Option<u32>, filter: u32) -> Result<Self> {
        let region = region.unwrap_or(0);
        if region > MAX_CODE_FIELD {
            return Err(EngineError::CodeOverflow(format!(
                "region code index {} does not fit two digits",
                region
            )));
        }
        if filter == 0 || filter > MAX_CODE_FIELD {
            return Err(EngineError::CodeOverflow(format!(
                "filter index {} is outside 1..=99",
                filter
            )));
        }

        Ok(Self {
            condition: (condition.unwrap_or(0) % 100) as u8,
            region: region as u8,
            filter: filter as u8,
        })
    }

    pub fn condition(&self) -> u8 {
        self.condition
    }

    pub fn region(&self) -> u8 {
        self.region
    }

    pub fn filter(&self) -> u8 {
        self.filter
    }
}

impl fmt::Display for ClassificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}{:02}", self.condition, self.region, self.filter)
    }
}

impl FromStr for ClassificationCode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EngineError::InvalidFilter(format!("'{}' is not a six-digit code", s));
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let field = |range: std::ops::Range<usize>| s[range].parse::<u8>().map_err(|_| invalid());
        Ok(Self {
            condition: field(0..2)?,
            region: field(2..4)?,
            filter: field(4..6)?,
        })
    }
}

impl TryFrom<String> for ClassificationCode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClassificationCode> for String {
    fn from(code: ClassificationCode) -> Self {
        code.to_string()
    }
}

/// Region name to two-digit code index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCodeMap {
    /// True when codes come from configuration and are never auto-assigned
    explicit: bool,
    codes: BTreeMap<String, u32>,
}

impl RegionCodeMap {
    /// Map that numbers regions by first appearance
    pub fn automatic() -> Self {
        Self::default()
    }

    /// Fixed map from configuration; unmapped regions get `00`
    pub fn explicit(codes: BTreeMap<String, u32>) -> Result<Self> {
        for (region, code) in &codes {
            if *code == 0 || *code > MAX_CODE_FIELD {
                return Err(EngineError::InvalidConfig(format!(
                    "region code for '{}' must be within 1..=99, got {}",
                    region, code
                )));
            }
        }
        Ok(Self {
            explicit: true,
            codes,
        })
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Assign codes to regions seen for the first time (automatic maps only)
    pub fn register<'a>(&mut self, regions: impl IntoIterator<Item = &'a String>) -> Result<()> {
        if self.explicit {
            return Ok(());
        }
        for region in regions {
            if self.codes.contains_key(region) {
                continue;
            }
            let next = self.codes.len() as u32 + 1;
            if next > MAX_CODE_FIELD {
                return Err(EngineError::CodeOverflow(format!(
                    "more than {} distinct regions used in filters",
                    MAX_CODE_FIELD
                )));
            }
            log::debug!("Region '{}' gets code index {:02}", region, next);
            self.codes.insert(region.clone(), next);
        }
        Ok(())
    }

    pub fn code_for(&self, region: &str) -> Option<u32> {
        self.codes.get(region).copied()
    }

    /// Region name owning a code index
    pub fn region_for(&self, code: u32) -> Option<&str> {
        self.codes
            .iter()
            .find(|(_, c)| **c == code)
            .map(|(name, _)| name.as_str())
    }

    /// Forget auto-assigned codes; explicit maps are kept
    pub fn reset(&mut self) {
        if !self.explicit {
            self.codes.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_formatting() {
        let code = ClassificationCode::derive(Some(1), Some(1), 1).unwrap();
        assert_eq!(code.to_string(), "010101");

        let wrapped = ClassificationCode::derive(Some(112), Some(4), 12).unwrap();
        assert_eq!(wrapped.to_string(), "120412");

        let absent = ClassificationCode::derive(None, None, 3).unwrap();
        assert_eq!(absent.to_string(), "000003");
    }

    #[test]
    fn test_code_overflow() {
        assert!(ClassificationCode::derive(Some(1), Some(100), 1).is_err());
        assert!(ClassificationCode::derive(Some(1), Some(1), 100).is_err());
        assert!(ClassificationCode::derive(Some(1), Some(1), 0).is_err());
    }

    #[test]
    fn test_code_parsing() {
        let code: ClassificationCode = "020307".parse().unwrap();
        assert_eq!((code.condition(), code.region(), code.filter()), (2, 3, 7));
        assert!("02037".parse::<ClassificationCode>().is_err());
        assert!("02a307".parse::<ClassificationCode>().is_err());
    }

    #[test]
    fn test_automatic_region_codes() {
        let mut map = RegionCodeMap::automatic();
        let first = vec!["Target".to_string(), "Ending".to_string()];
        let second = vec!["Ending".to_string(), "Pretarget".to_string()];
        map.register(&first).unwrap();
        map.register(&second).unwrap();

        assert_eq!(map.code_for("Target"), Some(1));
        assert_eq!(map.code_for("Ending"), Some(2));
        assert_eq!(map.code_for("Pretarget"), Some(3));
        assert_eq!(map.region_for(2), Some("Ending"));

        map.reset();
        assert_eq!(map.code_for("Target"), None);
    }

    #[test]
    fn test_explicit_region_codes() {
        let mut codes = BTreeMap::new();
        codes.insert("Target".to_string(), 3);
        let mut map = RegionCodeMap::explicit(codes).unwrap();

        map.register(&["Ending".to_string()]).unwrap();
        assert_eq!(map.code_for("Ending"), None);
        map.reset();
        assert_eq!(map.code_for("Target"), Some(3));

        let mut bad = BTreeMap::new();
        bad.insert("Target".to_string(), 0);
        assert!(RegionCodeMap::explicit(bad).is_err());
    }
}
