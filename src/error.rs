use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No scans found for protocol name '{protocol_name}'")]
    NoScansFound { protocol_name: String },

    #[error(
        "found {found} runs for task {task} (matching protocol name {protocol_name}), \
         but expected {expected} runs based on the naming protocol"
    )]
    RunCountMismatch {
        task: String,
        protocol_name: String,
        found: usize,
        expected: usize,
    },

    #[error(
        "found {found} scans for {what} (matching protocol name {protocol_name}); \
         there can only be one"
    )]
    MultipleMatch {
        what: String,
        protocol_name: String,
        found: usize,
    },

    #[error("file {file} was found in {subdir} but does not match the expected naming pattern for {expected}")]
    NamingPattern {
        file: String,
        subdir: String,
        expected: &'static str,
    },

    #[error("file {file} found in {subdir}, which is not a known scan type (func, fmap, or anat)")]
    UnknownScanType { file: String, subdir: String },

    #[error("series number {key} appears in both {first} and {second}")]
    DuplicateScanKey {
        key: u32,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("subject directory {subject_dir} not found in input directory {input_dir}")]
    SubjectDirectoryNotFound {
        subject_dir: String,
        input_dir: PathBuf,
    },

    #[error("Invalid scan metadata in {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PrepError>;
