use crate::constants::METADATA_EXTENSION;
use crate::error::{PrepError, Result};
use crate::pattern::FilenamePattern;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Series number assigned by the scanner; unique within a session.
pub type ScanKey = u32;

/// Scanner metadata for one physical scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub key: ScanKey,
    pub protocol_name: String,
    pub series_description: String,
    /// Seconds
    pub repetition_time: f64,
}

/// The subset of a dcm2niix JSON sidecar we care about
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Sidecar {
    series_number: ScanKey,
    protocol_name: String,
    series_description: String,
    repetition_time: f64,
}

/// All scans of one session, ordered by scan key.
#[derive(Debug, Clone, Default)]
pub struct ScanInventory {
    scans: BTreeMap<ScanKey, ScanRecord>,
}

impl ScanInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory inventory; a repeated key keeps the first record.
    #[cfg(test)]
    pub(crate) fn from_records<I: IntoIterator<Item = ScanRecord>>(records: I) -> Self {
        let mut inventory = Self::new();
        for record in records {
            inventory.scans.entry(record.key).or_insert(record);
        }
        inventory
    }

    pub fn get(&self, key: ScanKey) -> Option<&ScanRecord> {
        self.scans.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanRecord> {
        self.scans.values()
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

/// Metadata patterns always target JSON sidecars; `scan_*` means `scan_*.json`.
pub fn sidecar_pattern(pattern: &str) -> String {
    if pattern.contains(METADATA_EXTENSION) {
        pattern.to_string()
    } else {
        format!("{}{}", pattern, METADATA_EXTENSION)
    }
}

fn parse_sidecar(path: &Path) -> Result<ScanRecord> {
    let text = fs::read_to_string(path)?;
    let sidecar: Sidecar = serde_json::from_str(&text).map_err(|e| PrepError::Metadata {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(ScanRecord {
        key: sidecar.series_number,
        protocol_name: sidecar.protocol_name,
        series_description: sidecar.series_description,
        repetition_time: sidecar.repetition_time,
    })
}

/// Read every sidecar in `input_dir` matching `pattern`.
pub fn read_scan_metadata(input_dir: &Path, pattern: &str) -> Result<ScanInventory> {
    let pattern = FilenamePattern::new(&sidecar_pattern(pattern))?;
    let files = pattern.files_in(input_dir)?;
    info!(
        "Reading {} metadata files matching {} in {}",
        files.len(),
        pattern.as_str(),
        input_dir.display()
    );

    let mut inventory = ScanInventory::new();
    let mut origin: BTreeMap<ScanKey, PathBuf> = BTreeMap::new();
    for file in files {
        let record = parse_sidecar(&file)?;
        debug!(
            series = record.key,
            protocol = %record.protocol_name,
            "Loaded scan metadata from {}",
            file.display()
        );
        if let Some(first) = origin.get(&record.key) {
            return Err(PrepError::DuplicateScanKey {
                key: record.key,
                first: first.clone(),
                second: file,
            });
        }
        origin.insert(record.key, file);
        inventory.scans.insert(record.key, record);
    }
    Ok(inventory)
}
