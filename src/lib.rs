pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod subject;
pub mod table;

// One module per tool
pub mod conversion;
pub mod motion;
pub mod onsets;
pub mod sfnr;
