use crate::constants::{default_converted_name, DICOM_EXTENSION, MOTION_CORRECTED_MARKER};
use crate::conversion::metadata::{ScanInventory, ScanKey};
use crate::conversion::naming::{
    self, bids_anat_path, bids_fmap_path, bids_func_path, NamingConvention, PhaseEncoding,
};
use crate::conversion::protocol::{NamingProtocol, NamingProtocolEntry, ScanKind};
use crate::error::{PrepError, Result};
use crate::pattern::FilenamePattern;
use crate::subject::SubjectId;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// One output line of the forward conversion table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRow {
    pub source_scan_key: ScanKey,
    pub default_converted_name: String,
    pub bids_name: String,
    pub damn_name: String,
}

impl ConversionRow {
    fn new(key: ScanKey, bids_name: String, damn_name: String) -> Self {
        Self {
            source_scan_key: key,
            default_converted_name: default_converted_name(key),
            bids_name,
            damn_name,
        }
    }

    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.source_scan_key.to_string(),
            self.default_converted_name.clone(),
            self.bids_name.clone(),
            self.damn_name.clone(),
        ]
    }
}

/// Counts the acquired volumes of a series.
pub trait VolumeSource {
    fn count_volumes(&self, key: ScanKey) -> Result<usize>;
}

/// Raw DICOM directory with one `<series>-<volume>.dcm` file per volume.
pub struct DicomDirectory {
    dir: PathBuf,
}

impl DicomDirectory {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl VolumeSource for DicomDirectory {
    fn count_volumes(&self, key: ScanKey) -> Result<usize> {
        let pattern = FilenamePattern::new(&format!("{}-*{}", key, DICOM_EXTENSION))?;
        pattern.count_in(&self.dir)
    }
}

impl VolumeSource for HashMap<ScanKey, usize> {
    fn count_volumes(&self, key: ScanKey) -> Result<usize> {
        Ok(self.get(&key).copied().unwrap_or(0))
    }
}

/// Matches a session's scans against a naming protocol.
pub struct ProtocolResolver<'a> {
    inventory: &'a ScanInventory,
    volumes: &'a dyn VolumeSource,
    subject: &'a SubjectId,
    motion_corrected_marker: String,
}

impl<'a> ProtocolResolver<'a> {
    pub fn new(
        inventory: &'a ScanInventory,
        volumes: &'a dyn VolumeSource,
        subject: &'a SubjectId,
    ) -> Self {
        Self {
            inventory,
            volumes,
            subject,
            motion_corrected_marker: MOTION_CORRECTED_MARKER.to_string(),
        }
    }

    pub fn with_motion_corrected_marker(mut self, marker: impl Into<String>) -> Self {
        self.motion_corrected_marker = marker.into();
        self
    }

    /// Resolve every entry in protocol order. Nothing is returned unless all succeed.
    #[instrument(skip_all, fields(protocol = %protocol.label, subject = %self.subject))]
    pub fn resolve(&self, protocol: &NamingProtocol) -> Result<Vec<ConversionRow>> {
        let mut rows = Vec::new();
        for entry in &protocol.entries {
            let entry_rows = self.resolve_entry(entry)?;
            debug!("Entry {} produced {} rows", entry.label, entry_rows.len());
            rows.extend(entry_rows);
        }
        info!("Resolved {} conversion rows", rows.len());
        Ok(rows)
    }

    pub fn resolve_entry(&self, entry: &NamingProtocolEntry) -> Result<Vec<ConversionRow>> {
        match &entry.kind {
            ScanKind::Task {
                match_protocol_name,
                expected_run_count,
                expected_volume_count,
            } => self.resolve_task(
                entry,
                match_protocol_name,
                *expected_run_count,
                *expected_volume_count,
            ),
            ScanKind::Anatomical {
                match_protocol_name,
                modality,
            } => self.resolve_anatomical(entry, match_protocol_name, modality),
            ScanKind::Fieldmap {
                ap_protocol_name,
                pa_protocol_name,
            } => self.resolve_fieldmap(entry, ap_protocol_name, pa_protocol_name),
        }
    }

    /// Scans whose protocol name contains `protocol_name`, with motion-corrected
    /// duplicates kept or discarded per `use_motion_corrected`. Ascending by key.
    pub fn find_matching_scans(
        &self,
        protocol_name: &str,
        use_motion_corrected: bool,
    ) -> Result<Vec<ScanKey>> {
        let (corrected, uncorrected): (Vec<_>, Vec<_>) = self
            .inventory
            .iter()
            .filter(|scan| scan.protocol_name.contains(protocol_name))
            .partition(|scan| {
                scan.series_description
                    .contains(self.motion_corrected_marker.as_str())
            });

        let keep = if use_motion_corrected { corrected } else { uncorrected };
        if keep.is_empty() {
            return Err(PrepError::NoScansFound {
                protocol_name: protocol_name.to_string(),
            });
        }
        Ok(keep.into_iter().map(|scan| scan.key).collect())
    }

    fn resolve_task(
        &self,
        entry: &NamingProtocolEntry,
        protocol_name: &str,
        expected_runs: usize,
        expected_volumes: usize,
    ) -> Result<Vec<ConversionRow>> {
        let candidates = self.find_matching_scans(protocol_name, entry.use_motion_corrected)?;

        let mut complete = Vec::with_capacity(candidates.len());
        for key in candidates {
            let volumes = self.volumes.count_volumes(key)?;
            if volumes == expected_volumes {
                complete.push(key);
            } else {
                warn!(
                    series = key,
                    task = %entry.label,
                    "dcm series {} contains {} TRs, but expected {} TRs for task {}; excluding it",
                    key,
                    volumes,
                    expected_volumes,
                    entry.label
                );
            }
        }

        if complete.len() != expected_runs {
            return Err(PrepError::RunCountMismatch {
                task: entry.label.clone(),
                protocol_name: protocol_name.to_string(),
                found: complete.len(),
                expected: expected_runs,
            });
        }

        complete.sort_unstable();
        let subject = self.subject.as_str();
        Ok(complete
            .into_iter()
            .zip(1u32..)
            .map(|(key, run)| {
                ConversionRow::new(
                    key,
                    bids_func_path(subject, &entry.label, run),
                    naming::epi_name(NamingConvention::Damn, subject, &entry.label, run),
                )
            })
            .collect())
    }

    fn resolve_anatomical(
        &self,
        entry: &NamingProtocolEntry,
        protocol_name: &str,
        modality: &str,
    ) -> Result<Vec<ConversionRow>> {
        let key = self.single_match(
            protocol_name,
            entry.use_motion_corrected,
            format!("{} anatomical {}", modality, entry.label),
        )?;
        let subject = self.subject.as_str();
        Ok(vec![ConversionRow::new(
            key,
            bids_anat_path(subject, modality),
            naming::anat_name(NamingConvention::Damn, subject, modality),
        )])
    }

    fn resolve_fieldmap(
        &self,
        entry: &NamingProtocolEntry,
        ap_protocol_name: &str,
        pa_protocol_name: &str,
    ) -> Result<Vec<ConversionRow>> {
        let acq = naming::fieldmap_intended_for(&entry.label);
        let subject = self.subject.as_str();

        let mut rows = Vec::with_capacity(2);
        for direction in PhaseEncoding::ALL {
            let protocol_name = match direction {
                PhaseEncoding::AP => ap_protocol_name,
                PhaseEncoding::PA => pa_protocol_name,
            };
            let key = self.single_match(
                protocol_name,
                entry.use_motion_corrected,
                format!("{} spin echo {}", direction, entry.label),
            )?;
            rows.push(ConversionRow::new(
                key,
                bids_fmap_path(subject, &acq, direction.as_str()),
                naming::fieldmap_name(NamingConvention::Damn, subject, &acq, direction.as_str()),
            ));
        }
        Ok(rows)
    }

    fn single_match(
        &self,
        protocol_name: &str,
        use_motion_corrected: bool,
        what: String,
    ) -> Result<ScanKey> {
        let matches = self.find_matching_scans(protocol_name, use_motion_corrected)?;
        match matches.as_slice() {
            [key] => Ok(*key),
            _ => Err(PrepError::MultipleMatch {
                what,
                protocol_name: protocol_name.to_string(),
                found: matches.len(),
            }),
        }
    }
}
