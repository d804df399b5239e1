//! Framewise displacement summaries from MCFLIRT `.par` files.
//!
//! Each `.par` line holds `rx ry rz tx ty tz`. Displacement between consecutive
//! volumes is the Euclidean distance of the translations only.

use crate::config::MotionConfig;
use crate::error::{PrepError, Result};
use crate::pattern::FilenamePattern;
use crate::subject::SubjectId;
use crate::table;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Translation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Translation {
    pub fn distance(&self, other: &Translation) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunMotion {
    pub source: PathBuf,
    pub displacements: Vec<f64>,
    pub small_movements: usize,
    pub large_movements: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectMotion {
    pub subject: String,
    pub runs: Vec<RunMotion>,
}

pub fn parse_par(text: &str, source: &Path) -> Result<Vec<Translation>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                PrepError::Parse(format!("{} line {}: {}", source.display(), idx + 1, e))
            })?;
        match values.as_slice() {
            [_rx, _ry, _rz, x, y, z] => out.push(Translation { x: *x, y: *y, z: *z }),
            _ => {
                return Err(PrepError::Parse(format!(
                    "{} line {}: expected 6 motion parameters, found {}",
                    source.display(),
                    idx + 1,
                    values.len()
                )))
            }
        }
    }
    Ok(out)
}

/// Displacements between consecutive volumes, classified by threshold.
pub fn summarize_run(source: PathBuf, translations: &[Translation], thresholds: &MotionConfig) -> RunMotion {
    let displacements: Vec<f64> = translations
        .windows(2)
        .map(|pair| pair[1].distance(&pair[0]))
        .collect();
    let large_movements = displacements
        .iter()
        .filter(|d| **d > thresholds.large_threshold_mm)
        .count();
    let small_movements = displacements
        .iter()
        .filter(|d| **d > thresholds.small_threshold_mm && **d <= thresholds.large_threshold_mm)
        .count();
    RunMotion {
        source,
        displacements,
        small_movements,
        large_movements,
    }
}

pub fn summarize_subject(subject_dir: &Path, thresholds: &MotionConfig) -> Result<SubjectMotion> {
    let subject = subject_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let pars = FilenamePattern::new("*.par")?.files_in(subject_dir)?;
    let mut runs = Vec::with_capacity(pars.len());
    for par in pars {
        let text = fs::read_to_string(&par)?;
        let translations = parse_par(&text, &par)?;
        let run = summarize_run(par, &translations, thresholds);
        debug!(
            "{}: {} volumes, {} small, {} large",
            run.source.display(),
            translations.len(),
            run.small_movements,
            run.large_movements
        );
        runs.push(run);
    }
    Ok(SubjectMotion { subject, runs })
}

/// Rows of the `dists_<subject>.csv` summary.
pub fn summary_rows(motion: &SubjectMotion) -> Vec<Vec<String>> {
    let shortest = motion
        .runs
        .iter()
        .map(|r| r.displacements.len())
        .min()
        .unwrap_or(0);
    let longest = motion
        .runs
        .iter()
        .map(|r| r.displacements.len())
        .max()
        .unwrap_or(0);
    if shortest != longest {
        warn!(
            "{}: runs have between {} and {} displacements; table is truncated to {}",
            motion.subject, shortest, longest, shortest
        );
    }

    let mut rows: Vec<Vec<String>> = (0..shortest)
        .map(|i| {
            motion
                .runs
                .iter()
                .map(|r| r.displacements[i].to_string())
                .collect()
        })
        .collect();

    let header: Vec<String> = (1..=motion.runs.len()).map(|n| n.to_string()).collect();
    rows.push(vec!["small".to_string()]);
    rows.push(header.clone());
    rows.push(motion.runs.iter().map(|r| r.small_movements.to_string()).collect());
    rows.push(vec!["big".to_string()]);
    rows.push(header);
    rows.push(motion.runs.iter().map(|r| r.large_movements.to_string()).collect());
    rows
}

/// Subject directories (`s*`) directly below the preprocessing directory.
pub fn subject_dirs(prep_dir: &Path, only: Option<&SubjectId>) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(prep_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => PrepError::Io(io),
            None => PrepError::Parse(format!("filesystem loop under {}", prep_dir.display())),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let wanted = match only {
            Some(subject) => name == subject.as_str(),
            None => name.starts_with('s'),
        };
        if wanted {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Write one summary per subject; returns the files written.
pub fn run(
    prep_dir: &Path,
    subject: Option<&SubjectId>,
    thresholds: &MotionConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for dir in subject_dirs(prep_dir, subject)? {
        let motion = summarize_subject(&dir, thresholds)?;
        let span = info_span!("motion", subject = %motion.subject);
        let _enter = span.enter();

        if motion.runs.is_empty() {
            warn!("No .par files in {}; skipping", dir.display());
            continue;
        }
        let out = prep_dir.join(format!("dists_{}.csv", motion.subject));
        table::write_rows(&out, &summary_rows(&motion))?;
        info!("Wrote motion summary for {} runs to {}", motion.runs.len(), out.display());
        written.push(out);
    }
    if written.is_empty() {
        warn!("No subject motion summaries written under {}", prep_dir.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> MotionConfig {
        MotionConfig::default()
    }

    fn t(x: f64, y: f64, z: f64) -> Translation {
        Translation { x, y, z }
    }

    #[test]
    fn test_parse_par_uses_translation_columns() {
        let text = "0.01 0.02 0.03 1.0 2.0 3.0\n\n-0.01 0 0 1.5 2.0 3.0\n";
        let parsed = parse_par(text, Path::new("run1.par")).unwrap();
        assert_eq!(parsed, vec![t(1.0, 2.0, 3.0), t(1.5, 2.0, 3.0)]);
    }

    #[test]
    fn test_parse_par_rejects_short_lines() {
        let err = parse_par("0 0 0 1 2\n", Path::new("run1.par")).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_thresholds_split_small_and_large() {
        let translations = vec![
            t(0.0, 0.0, 0.0),
            t(0.3, 0.0, 0.0), // 0.3: still
            t(0.3, 0.0, 1.0), // 1.0: small
            t(0.3, 3.0, 1.0), // 3.0: large
            t(0.3, 3.0, 3.0), // 2.0: small, boundary belongs to small
        ];
        let run = summarize_run(PathBuf::from("r.par"), &translations, &thresholds());
        assert_eq!(run.displacements.len(), 4);
        assert!((run.displacements[2] - 3.0).abs() < 1e-12);
        assert_eq!(run.small_movements, 2);
        assert_eq!(run.large_movements, 1);
    }

    #[test]
    fn test_subject_filter_uses_normalized_id() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["s001", "s002", "group"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }

        let only = SubjectId::parse("001").unwrap();
        let dirs = subject_dirs(dir.path(), Some(&only)).unwrap();
        assert_eq!(dirs, vec![dir.path().join("s001")]);

        let all = subject_dirs(dir.path(), None).unwrap();
        assert_eq!(all, vec![dir.path().join("s001"), dir.path().join("s002")]);
    }

    #[test]
    fn test_summary_layout() {
        let motion = SubjectMotion {
            subject: "s001".to_string(),
            runs: vec![
                RunMotion {
                    source: PathBuf::from("a.par"),
                    displacements: vec![0.25, 1.0, 3.0],
                    small_movements: 1,
                    large_movements: 1,
                },
                RunMotion {
                    source: PathBuf::from("b.par"),
                    displacements: vec![0.5, 0.75],
                    small_movements: 0,
                    large_movements: 0,
                },
            ],
        };
        let rows = summary_rows(&motion);
        let text = table::render_rows(&rows);
        assert_eq!(text, "0.25,0.5\n1,0.75\nsmall\n1,2\n1,0\nbig\n1,2\n1,0\n");
    }
}
