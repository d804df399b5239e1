//! Scanner metadata → target filename conversion tables.

pub mod metadata;
pub mod naming;
pub mod protocol;
pub mod resolver;
pub mod reverse;

use crate::config::ConversionConfig;
use crate::error::{PrepError, Result};
use crate::subject::SubjectId;
use crate::table;
use std::path::{Path, PathBuf};
use tracing::info;

pub use metadata::{read_scan_metadata, ScanInventory, ScanKey, ScanRecord};
pub use protocol::{NamingProtocol, NamingProtocolEntry, ProtocolDocument, ScanKind};
pub use resolver::{ConversionRow, DicomDirectory, ProtocolResolver, VolumeSource};
pub use reverse::{bids_to_damn, ReverseRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionType {
    /// Scanner metadata → BIDS and study-layout names
    DcmToBids,
    /// Existing BIDS files → study-layout names
    BidsToDamn,
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub conversion: ConversionType,
    pub input_dir: PathBuf,
    pub input_filename_pattern: Option<String>,
    pub protocol_path: Option<PathBuf>,
    pub subject: SubjectId,
}

/// Build the full conversion table in memory.
pub fn build_table(request: &ConversionRequest, config: &ConversionConfig) -> Result<Vec<Vec<String>>> {
    match request.conversion {
        ConversionType::DcmToBids => {
            let protocol_path = request.protocol_path.as_deref().ok_or_else(|| {
                PrepError::InvalidArgument(
                    "a naming protocol file (-k) is required unless the conversion type is bids-damn"
                        .to_string(),
                )
            })?;
            let pattern = request
                .input_filename_pattern
                .as_deref()
                .unwrap_or(config.metadata_pattern.as_str());
            let rows = dcm_to_bids(
                &request.input_dir,
                pattern,
                protocol_path,
                &request.subject,
                &config.motion_corrected_marker,
            )?;
            Ok(rows.iter().map(ConversionRow::to_fields).collect())
        }
        ConversionType::BidsToDamn => {
            let rows = bids_to_damn(&request.input_dir, &request.subject)?;
            Ok(rows.iter().map(ReverseRow::to_fields).collect())
        }
    }
}

/// Resolve a raw DICOM session directory against a naming protocol file.
pub fn dcm_to_bids(
    input_dir: &Path,
    pattern: &str,
    protocol_path: &Path,
    subject: &SubjectId,
    motion_corrected_marker: &str,
) -> Result<Vec<ConversionRow>> {
    let inventory = read_scan_metadata(input_dir, pattern)?;
    let protocol = ProtocolDocument::load(protocol_path)?.select(subject)?;
    let volumes = DicomDirectory::new(input_dir);
    ProtocolResolver::new(&inventory, &volumes, subject)
        .with_motion_corrected_marker(motion_corrected_marker)
        .resolve(&protocol)
}

/// Build the table and write it only once every row resolved.
pub fn run(request: &ConversionRequest, config: &ConversionConfig, output_file: &Path) -> Result<usize> {
    let rows = build_table(request, config)?;
    table::write_rows(output_file, &rows)?;
    info!("Wrote {} rows to {}", rows.len(), output_file.display());
    Ok(rows.len())
}
