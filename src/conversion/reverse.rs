use crate::constants::{bids_subject_dir, ANAT_SUBDIR, FMAP_SUBDIR, FUNC_SUBDIR, NIFTI_EXTENSION};
use crate::conversion::naming::{self, NamingConvention};
use crate::error::{PrepError, Result};
use crate::subject::SubjectId;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static FUNC_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sub-(?P<sub>s[0-9]{3})_task-(?P<tsk>[A-Z]{3})_run-(?P<run>[0-9]{2}).*_bold\.nii\.gz$")
        .expect("func grammar is valid")
});

static FMAP_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sub-(?P<sub>s[0-9]{3})_acq-(?P<tsk>[A-Za-z]{3,4})_dir-(?P<dir>[A-Z]{2}).*_epi\.nii\.gz$")
        .expect("fmap grammar is valid")
});

static ANAT_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sub-(?P<sub>s[0-9]{3})_.*\.nii\.gz$").expect("anat grammar is valid")
});

/// One output line of the reverse conversion table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseRow {
    pub source_path: PathBuf,
    pub damn_name: String,
}

impl ReverseRow {
    pub fn to_fields(&self) -> Vec<String> {
        vec![self.source_path.display().to_string(), self.damn_name.clone()]
    }
}

/// Where the subject's BIDS tree lives: the input itself, `<input>/sub-<s>`,
/// or `<input>/bids/sub-<s>`.
pub fn locate_subject_dir(input_dir: &Path, subject: &SubjectId) -> Result<PathBuf> {
    let subject_dirname = bids_subject_dir(subject.as_str());
    let is_subject_dir = input_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n == subject_dirname)
        .unwrap_or(false);

    let file_dir = if is_subject_dir {
        input_dir.to_path_buf()
    } else {
        let direct = input_dir.join(&subject_dirname);
        if direct.exists() {
            direct
        } else {
            input_dir.join("bids").join(&subject_dirname)
        }
    };

    if !file_dir.is_dir() {
        return Err(PrepError::SubjectDirectoryNotFound {
            subject_dir: subject_dirname,
            input_dir: input_dir.to_path_buf(),
        });
    }
    Ok(file_dir)
}

/// Infer study-layout names for every NIfTI in the subject's BIDS tree.
pub fn bids_to_damn(input_dir: &Path, subject: &SubjectId) -> Result<Vec<ReverseRow>> {
    let file_dir = locate_subject_dir(input_dir, subject)?;
    info!("Reading BIDS files from {}", file_dir.display());

    let mut niftis = Vec::new();
    for entry in WalkDir::new(&file_dir).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => PrepError::Io(io),
            None => PrepError::Parse(format!("filesystem loop under {}", file_dir.display())),
        })?;
        let is_nifti = entry
            .file_name()
            .to_str()
            .map(|n| n.ends_with(NIFTI_EXTENSION))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_nifti {
            niftis.push(entry.into_path());
        }
    }
    niftis.sort();

    niftis
        .into_iter()
        .map(|path| {
            let damn_name = damn_name_for(&path, subject)?;
            debug!("{} -> {}", path.display(), damn_name);
            Ok(ReverseRow {
                source_path: path,
                damn_name,
            })
        })
        .collect()
}

/// Study-layout name for one BIDS file, judged by its category subdirectory.
pub fn damn_name_for(path: &Path, subject: &SubjectId) -> Result<String> {
    let subdir = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let sub = subject.as_str();

    let grammar_error = |expected: &'static str| PrepError::NamingPattern {
        file: filename.clone(),
        subdir: subdir.clone(),
        expected,
    };

    match subdir.as_str() {
        FUNC_SUBDIR => {
            let caps = FUNC_GRAMMAR
                .captures(&filename)
                .ok_or_else(|| grammar_error("epi"))?;
            check_subject(&caps, subject, &filename);
            let run: u32 = caps["run"].parse().map_err(|_| grammar_error("epi"))?;
            Ok(naming::epi_name(NamingConvention::Damn, sub, &caps["tsk"], run))
        }
        FMAP_SUBDIR => {
            let caps = FMAP_GRAMMAR
                .captures(&filename)
                .ok_or_else(|| grammar_error("spin echo"))?;
            check_subject(&caps, subject, &filename);
            Ok(naming::fieldmap_name(
                NamingConvention::Damn,
                sub,
                &caps["tsk"],
                &caps["dir"],
            ))
        }
        ANAT_SUBDIR => {
            let caps = ANAT_GRAMMAR
                .captures(&filename)
                .ok_or_else(|| grammar_error("anatomical"))?;
            check_subject(&caps, subject, &filename);
            Ok(naming::anat_name(NamingConvention::Damn, sub, ""))
        }
        _ => Err(PrepError::UnknownScanType {
            file: filename.clone(),
            subdir: subdir.clone(),
        }),
    }
}

fn check_subject(caps: &Captures<'_>, subject: &SubjectId, filename: &str) {
    if &caps["sub"] != subject.as_str() {
        warn!(
            "{} is labelled {} but is being converted for {}",
            filename,
            &caps["sub"],
            subject
        );
    }
}
