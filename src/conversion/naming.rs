//! Filename builders for the two target layouts.
//!
//! BIDS places files under `func/`, `fmap/`, `anat/` inside the subject
//! directory. The study layout groups by task first: `<TSK>/<subject>/...`,
//! with session-wide scans under `ALL/`.

use crate::constants::{
    ANAT_SUBDIR, BIDS_SESSION_WIDE_ACQ, FIELDMAP_LABEL_SUFFIX, FMAP_SUBDIR, FUNC_SUBDIR,
    NIFTI_EXTENSION, SESSION_WIDE_TOKEN,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingConvention {
    Bids,
    Damn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEncoding {
    AP,
    PA,
}

impl PhaseEncoding {
    pub const ALL: [PhaseEncoding; 2] = [PhaseEncoding::AP, PhaseEncoding::PA];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseEncoding::AP => "AP",
            PhaseEncoding::PA => "PA",
        }
    }
}

impl fmt::Display for PhaseEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional run, without the BIDS category directory.
pub fn epi_name(convention: NamingConvention, subject: &str, task: &str, run: u32) -> String {
    match convention {
        NamingConvention::Bids => format!(
            "sub-{}_task-{}_run-{:02}_bold{}",
            subject, task, run, NIFTI_EXTENSION
        ),
        NamingConvention::Damn => format!(
            "{}/{}/epi_{}_r{:02}{}",
            task, subject, task, run, NIFTI_EXTENSION
        ),
    }
}

/// Spin-echo fieldmap. `acq` is either a task token or the session-wide sentinel
/// in either spelling (`ALL` / `task`); each convention normalizes to its own.
pub fn fieldmap_name(convention: NamingConvention, subject: &str, acq: &str, direction: &str) -> String {
    match convention {
        NamingConvention::Bids => {
            let acq = if acq == SESSION_WIDE_TOKEN { BIDS_SESSION_WIDE_ACQ } else { acq };
            format!(
                "sub-{}_acq-{}_dir-{}_epi{}",
                subject, acq, direction, NIFTI_EXTENSION
            )
        }
        NamingConvention::Damn => {
            let task = if acq == BIDS_SESSION_WIDE_ACQ { SESSION_WIDE_TOKEN } else { acq };
            format!(
                "{}/{}/{}_SE_{}{}",
                task, subject, task, direction, NIFTI_EXTENSION
            )
        }
    }
}

pub fn anat_name(convention: NamingConvention, subject: &str, modality: &str) -> String {
    match convention {
        NamingConvention::Bids => format!("sub-{}_{}{}", subject, modality, NIFTI_EXTENSION),
        NamingConvention::Damn => format!("{}/{}/anat{}", SESSION_WIDE_TOKEN, subject, NIFTI_EXTENSION),
    }
}

/// The task a fieldmap label is intended for: `TSK_SE` → `TSK`, `ALL_SE` → `ALL`.
pub fn fieldmap_intended_for(label: &str) -> String {
    label.replace(FIELDMAP_LABEL_SUFFIX, "")
}

pub fn bids_func_path(subject: &str, task: &str, run: u32) -> String {
    format!("{}/{}", FUNC_SUBDIR, epi_name(NamingConvention::Bids, subject, task, run))
}

pub fn bids_fmap_path(subject: &str, acq: &str, direction: &str) -> String {
    format!(
        "{}/{}",
        FMAP_SUBDIR,
        fieldmap_name(NamingConvention::Bids, subject, acq, direction)
    )
}

pub fn bids_anat_path(subject: &str, modality: &str) -> String {
    format!("{}/{}", ANAT_SUBDIR, anat_name(NamingConvention::Bids, subject, modality))
}
