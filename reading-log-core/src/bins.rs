//! Bin aggregation
//!
//! Collects the distinct classification codes of a set of datasets and
//! describes each one for the downstream binning tool.

use crate::dataset::Dataset;
use crate::filter::ClassificationCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One bin: a code and what it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinEntry {
    /// 1-based, in (condition, region, code) order
    pub number: usize,
    pub code: ClassificationCode,
    pub description: String,
}

/// Codes grouped by condition digits, then region digits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinTable {
    groups: BTreeMap<u8, BTreeMap<u8, Vec<BinEntry>>>,
}

impl BinTable {
    /// Aggregate every code found in `datasets`; the datasets are not modified
    pub fn collect<'d>(datasets: impl IntoIterator<Item = &'d Dataset>) -> Self {
        let datasets: Vec<&Dataset> = datasets.into_iter().collect();
        let codes: BTreeSet<ClassificationCode> = datasets.iter().flat_map(|d| d.codes()).collect();

        let count = codes.len();
        let mut groups: BTreeMap<u8, BTreeMap<u8, Vec<BinEntry>>> = BTreeMap::new();
        for (position, code) in codes.into_iter().enumerate() {
            let entry = BinEntry {
                number: position + 1,
                code,
                description: describe(&datasets, code),
            };
            groups
                .entry(code.condition())
                .or_default()
                .entry(code.region())
                .or_default()
                .push(entry);
        }

        log::debug!("Collected {} bins from {} datasets", count, datasets.len());
        Self { groups }
    }

    pub fn groups(&self) -> &BTreeMap<u8, BTreeMap<u8, Vec<BinEntry>>> {
        &self.groups
    }

    /// All bins in number order
    pub fn entries(&self) -> impl Iterator<Item = &BinEntry> {
        self.groups.values().flat_map(|regions| regions.values().flatten())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Describe a code from the filter that produced it
///
/// Only datasets that actually carry `code` can own it; filter indexes are
/// per dataset, so the same index may name different specs elsewhere.
fn describe(datasets: &[&Dataset], code: ClassificationCode) -> String {
    let owner = datasets
        .iter()
        .filter(|d| d.codes().any(|c| c == code))
        .find_map(|d| d.applied_filter(code.filter() as u32).map(|f| (*d, f)));

    match owner {
        Some((dataset, applied)) => {
            let region = dataset
                .region_codes()
                .region_for(code.region() as u32)
                .unwrap_or("unmapped region");
            format!(
                "condition {}, {} (filter {}): {}",
                code.condition(),
                region,
                code.filter(),
                applied.spec.describe()
            )
        }
        None => format!("condition {}, filter code {}", code.condition(), code.filter()),
    }
}
