//! Input decoding: event files and boundary tables

use crate::config::StimulusConfig;
use anyhow::{Context, Result};
use rayon::prelude::*;
use reading_log_core::boundaries::LayoutEntry;
use reading_log_core::{BoundaryTable, Dataset, FixedPitchLayout, RawRecord, ReadingAnalyzer};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Dataset name for an event file: its file stem
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read one event file (a JSON array of records)
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file: {:?}", path))?;
    let records: Vec<RawRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event file: {:?}", path))?;
    log::debug!("{:?}: {} records", path, records.len());
    Ok(records)
}

/// An event file that could not be decoded
#[derive(Debug, Clone, Serialize)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

/// Datasets decoded from the event files, plus the files that failed
#[derive(Debug, Default)]
pub struct LoadedDatasets {
    pub datasets: Vec<Dataset>,
    pub skipped: Vec<SkippedInput>,
}

/// Decode every event file into a dataset, in parallel; order follows `paths`
///
/// A file that cannot be read or parsed is skipped with a warning.
pub fn load_datasets(paths: &[PathBuf], analyzer: &ReadingAnalyzer) -> LoadedDatasets {
    let results: Vec<(&PathBuf, Result<Dataset>)> = paths
        .par_iter()
        .map(|path| {
            let dataset = load_records(path).map(|records| analyzer.load_dataset(dataset_name(path), &records));
            (path, dataset)
        })
        .collect();

    let mut loaded = LoadedDatasets::default();
    for (path, result) in results {
        match result {
            Ok(dataset) => loaded.datasets.push(dataset),
            Err(e) => {
                log::warn!("Skipping {:?}: {:#}", path, e);
                loaded.skipped.push(SkippedInput {
                    path: path.clone(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }
    loaded
}

/// Merge boundary files and fixed-pitch stimuli into one table
///
/// Later entries replace earlier ones for the same (condition, item).
pub fn load_boundaries(
    paths: &[PathBuf],
    layout: &FixedPitchLayout,
    stimuli: &[StimulusConfig],
) -> Result<BoundaryTable> {
    let mut table = BoundaryTable::new();

    for path in paths {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read boundary file: {:?}", path))?;
        let entries: Vec<LayoutEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse boundary file: {:?}", path))?;
        log::info!("Loaded {} stimulus layouts from {:?}", entries.len(), path);
        for entry in entries {
            table.insert(entry.condition, entry.item, entry.regions);
        }
    }

    for stimulus in stimuli {
        let built = layout.build(&stimulus.regions).with_context(|| {
            format!(
                "Failed to lay out stimulus for condition {} item {}",
                stimulus.condition, stimulus.item
            )
        })?;
        table.insert(stimulus.condition, stimulus.item, built);
    }

    log::info!("Boundary table covers {} (condition, item) pairs", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reading_log_core::{BoundaryLookup, EngineConfig, TriggerVocabulary, WordHit, WordKey};

    #[test]
    fn test_load_datasets_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("p01.json");
        let second = dir.path().join("p02.json");
        fs::write(
            &first,
            r#"[{"type": "T_START"}, {"type": "R_fixation", "fix_avgpos_x": 310.5}, {"type": 200}]"#,
        )
        .unwrap();
        fs::write(&second, r#"[{"type": "R_saccade", "sac_startpos_x": 1, "sac_endpos_x": null}]"#).unwrap();

        let analyzer = ReadingAnalyzer::new(EngineConfig::new(TriggerVocabulary::new("T_START", "T_END"))).unwrap();
        let loaded = load_datasets(&[first, second], &analyzer);
        assert!(loaded.skipped.is_empty());
        let datasets = loaded.datasets;

        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].name(), "p01");
        assert_eq!(datasets[0].len(), 3);
        assert_eq!(datasets[0].events()[1].fixation_x(), Some(310.5));
        assert_eq!(datasets[0].events()[2].label, "200");
        assert_eq!(datasets[1].name(), "p02");
        assert!(datasets[1].events()[0].is_saccade());
    }

    #[test]
    fn test_unparseable_event_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("p01.json");
        let broken = dir.path().join("p02.json");
        let missing = dir.path().join("p03.json");
        fs::write(&good, r#"[{"type": "S"}, {"type": "E"}]"#).unwrap();
        fs::write(&broken, "{not json").unwrap();

        let analyzer = ReadingAnalyzer::new(EngineConfig::new(TriggerVocabulary::new("S", "E"))).unwrap();
        let loaded = load_datasets(&[good, broken.clone(), missing.clone()], &analyzer);

        assert_eq!(loaded.datasets.len(), 1);
        assert_eq!(loaded.datasets[0].name(), "p01");
        assert_eq!(loaded.skipped.len(), 2);
        assert_eq!(loaded.skipped[0].path, broken);
        assert!(loaded.skipped[0].reason.contains("Failed to parse event file"));
        assert_eq!(loaded.skipped[1].path, missing);
        assert!(loaded.skipped[1].reason.contains("Failed to read event file"));
    }

    #[test]
    fn test_boundaries_from_file_and_stimuli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounds.json");
        fs::write(
            &path,
            r#"[{
                "condition": 1, "item": 1,
                "regions": [
                    {"index": 1, "name": "A", "words": [{"key": "1.1", "start": 0, "end": 50}]},
                    {"index": 2, "name": "B", "words": [{"key": "2_1", "start": 50, "end": 100}]}
                ]
            }]"#,
        )
        .unwrap();

        let stimuli = vec![StimulusConfig {
            condition: 2,
            item: 1,
            regions: vec![("Pretarget".into(), "The man".into()), ("Target".into(), "left.".into())],
        }];
        let table = load_boundaries(&[path], &FixedPitchLayout::default(), &stimuli).unwrap();

        assert_eq!(table.keys(), vec![(1, 1), (2, 1)]);
        let from_file = table.layout(1, 1).unwrap();
        assert_eq!(from_file.resolve(60.0), WordHit::Word(WordKey::new(2, 1)));

        // "The" starts at the default 281 px offset and is 3 characters wide
        let built = table.layout(2, 1).unwrap();
        assert_eq!(built.resolve(290.0), WordHit::Word(WordKey::new(1, 1)));
        assert_eq!(built.resolve(270.0), WordHit::LeftOfText);
    }
}
