/// Naming constants shared by the conversion tools.
/// These define the tokens both naming conventions agree on.

// Series description marker added by the scanner's in-line motion correction
pub const MOTION_CORRECTED_MARKER: &str = "MoCoSeries";

// Default glob for scan metadata sidecars
pub const DEFAULT_METADATA_PATTERN: &str = "*.json";
pub const METADATA_EXTENSION: &str = ".json";

// Raw per-volume DICOM files are named `<series>-<volume>.dcm`
pub const DICOM_EXTENSION: &str = ".dcm";
pub const NIFTI_EXTENSION: &str = ".nii.gz";

// Naming protocol label used when no subject-specific override exists
pub const DEFAULT_PROTOCOL_LABEL: &str = "default";

// Fieldmap labels are `<intended-for>_SE`; `ALL_SE` covers the whole session
pub const FIELDMAP_LABEL_SUFFIX: &str = "_SE";
pub const SESSION_WIDE_TOKEN: &str = "ALL";
pub const BIDS_SESSION_WIDE_ACQ: &str = "task";

pub const DEFAULT_ANAT_MODALITY: &str = "T1w";

// BIDS category subdirectories
pub const FUNC_SUBDIR: &str = "func";
pub const FMAP_SUBDIR: &str = "fmap";
pub const ANAT_SUBDIR: &str = "anat";

/// Converted filename dcm2niix produces for a series before renaming
pub fn default_converted_name(series_number: u32) -> String {
    format!("scan_{:02}{}", series_number, NIFTI_EXTENSION)
}

/// BIDS subject directory name, e.g. `sub-s001`
pub fn bids_subject_dir(subject: &str) -> String {
    format!("sub-{}", subject)
}
