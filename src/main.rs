use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info_span;

use neuroprep::config::Config;
use neuroprep::conversion::{self, ConversionRequest, ConversionType};
use neuroprep::logging;
use neuroprep::onsets::{self, LogLayout, OnsetRequest};
use neuroprep::subject::SubjectId;
use neuroprep::{motion, sfnr};

#[derive(Parser)]
#[command(name = "neuroprep")]
#[command(about = "Preparation tools for the fMRI analysis pipeline")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./neuroprep.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a conversion key mapping scans to BIDS and study-layout filenames
    ConversionNames {
        /// Kind of conversion to do
        #[arg(short = 't', long = "type", value_enum)]
        kind: ConversionKind,
        /// Directory with scan metadata (dcm-bids) or the BIDS tree (bids-damn)
        #[arg(short, long)]
        input_dir: PathBuf,
        /// Metadata filename pattern, e.g. 'scan_*' (.json is appended when missing)
        #[arg(long)]
        input_filename_pattern: Option<String>,
        /// Naming protocol JSON file; required unless the type is bids-damn
        #[arg(short, long)]
        key: Option<PathBuf>,
        /// Output table (.csv)
        #[arg(short, long)]
        output_file: PathBuf,
        /// Subject ID, e.g. s001 (a bare 001 is accepted)
        subject: String,
    },
    /// Summarize framewise displacement from motion-correction .par files
    Motion {
        /// Preprocessing directory holding one s* directory per subject
        #[arg(short, long)]
        prep_dir: PathBuf,
        /// Only summarize this subject (s001 or 001)
        #[arg(short, long)]
        subject: Option<String>,
    },
    /// Write per-condition onset and duration files from behavioral logs
    Onsets {
        /// Task name as it appears in behavioral log filenames
        #[arg(short = 't', long)]
        task: String,
        /// Study task code used for output directories (e.g. TSK)
        #[arg(short = 'T', long = "study-task")]
        study_task: String,
        #[arg(short, long)]
        subject: String,
        /// Repetition time in seconds
        #[arg(long)]
        tr: f64,
        /// Volumes per run
        #[arg(short, long)]
        volumes: u32,
        /// Directory with one behavioral-log directory per subject
        #[arg(short = 'p', long, default_value = ".")]
        path: PathBuf,
        /// Output root (defaults to onsets.output_root from config)
        #[arg(short = 'O', long)]
        output_root: Option<PathBuf>,
        /// Comma-separated column order of the logs
        #[arg(short, long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
        /// Name of the onset column
        #[arg(long, default_value = "onset")]
        onset_column: String,
        /// Name of a duration column (default: response time, else trial length)
        #[arg(long)]
        duration_column: Option<String>,
        /// Only write these conditions (comma-separated)
        #[arg(long, value_delimiter = ',')]
        conditions: Option<Vec<String>>,
    },
    /// Print the SFNR values of a QA index.html report
    Sfnr {
        /// Path to the index.html file to parse
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConversionKind {
    #[value(name = "dcm-bids")]
    DcmBids,
    #[value(name = "bids-damn")]
    BidsDamn,
}

impl From<ConversionKind> for ConversionType {
    fn from(kind: ConversionKind) -> Self {
        match kind {
            ConversionKind::DcmBids => ConversionType::DcmToBids,
            ConversionKind::BidsDamn => ConversionType::BidsToDamn,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::ConversionNames {
            kind,
            input_dir,
            input_filename_pattern,
            key,
            output_file,
            subject,
        } => {
            let subject = SubjectId::parse(&subject)?;
            let span = info_span!("conversion_names", subject = %subject);
            let _enter = span.enter();

            let request = ConversionRequest {
                conversion: kind.into(),
                input_dir,
                input_filename_pattern,
                protocol_path: key,
                subject,
            };
            conversion::run(&request, &config.conversion, &output_file).with_context(|| {
                format!("Failed to build conversion key {}", output_file.display())
            })?;
        }
        Commands::Motion { prep_dir, subject } => {
            let subject = subject.as_deref().map(SubjectId::parse).transpose()?;
            let _enter = info_span!("motion").entered();
            motion::run(&prep_dir, subject.as_ref(), &config.motion)
                .with_context(|| format!("Failed to summarize motion in {}", prep_dir.display()))?;
        }
        Commands::Onsets {
            task,
            study_task,
            subject,
            tr,
            volumes,
            path,
            output_root,
            columns,
            onset_column,
            duration_column,
            conditions,
        } => {
            let subject = SubjectId::parse(&subject)?.to_string();
            let _enter = info_span!("onsets", subject = %subject, task = %task).entered();
            let layout = match columns {
                Some(columns) => LogLayout::new(columns, &onset_column, duration_column.as_deref())?,
                None => {
                    let defaults = onsets::DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
                    LogLayout::new(defaults, &onset_column, duration_column.as_deref())?
                }
            };
            let request = OnsetRequest {
                task,
                study_task,
                subject,
                repetition_time: tr,
                volumes,
                behavior_dir: path,
                output_root: output_root.unwrap_or_else(|| config.onsets.output_root.clone()),
                conditions,
            };
            onsets::run(&request, &layout).context("Failed to extract onsets")?;
        }
        Commands::Sfnr { input } => {
            let values = sfnr::run(&input)
                .with_context(|| format!("Failed to read SFNR values from {}", input.display()))?;
            println!("{}", values);
        }
    }
    Ok(())
}
