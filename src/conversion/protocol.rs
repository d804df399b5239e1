//! Naming protocol ("scan list") documents.
//!
//! A document maps protocol labels (`default` and optional per-subject
//! overrides) to an ordered set of entries, one per logical scan of interest.

use crate::constants::{DEFAULT_ANAT_MODALITY, DEFAULT_PROTOCOL_LABEL};
use crate::error::{PrepError, Result};
use crate::subject::SubjectId;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::info;

/// One rule mapping scanner acquisitions to a logical scan label.
#[derive(Debug, Clone, PartialEq)]
pub struct NamingProtocolEntry {
    pub label: String,
    pub use_motion_corrected: bool,
    pub kind: ScanKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanKind {
    Task {
        match_protocol_name: String,
        expected_run_count: usize,
        expected_volume_count: usize,
    },
    Anatomical {
        match_protocol_name: String,
        modality: String,
    },
    Fieldmap {
        ap_protocol_name: String,
        pa_protocol_name: String,
    },
}

/// The entries selected for one subject, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct NamingProtocol {
    pub label: String,
    pub entries: Vec<NamingProtocolEntry>,
}

/// Protocol document with every label still available.
#[derive(Debug, Clone)]
pub struct ProtocolDocument {
    protocols: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawKind {
    Task,
    #[serde(alias = "anatomical")]
    Anat,
    Fieldmap,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "type")]
    kind: RawKind,
    protocol_name: Value,
    nruns: Option<usize>,
    ntrs: Option<usize>,
    #[serde(rename = "useMoCo", default)]
    use_moco: Option<Value>,
    modality: Option<String>,
}

impl ProtocolDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            PrepError::Configuration(format!(
                "Failed to read naming protocol '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(protocols) => Ok(Self { protocols }),
            _ => Err(PrepError::Configuration(
                "naming protocol must be a JSON object keyed by protocol label".to_string(),
            )),
        }
    }

    /// Protocol labels in document order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.protocols.keys().map(String::as_str)
    }

    /// Pick the first label naming the subject, falling back to `default`.
    pub fn select_label(&self, subject: &SubjectId) -> Result<&str> {
        if let Some(label) = self.labels().find(|l| l.contains(subject.as_str())) {
            return Ok(label);
        }
        if self.protocols.contains_key(DEFAULT_PROTOCOL_LABEL) {
            return Ok(DEFAULT_PROTOCOL_LABEL);
        }
        Err(PrepError::Configuration(format!(
            "naming protocol has neither an entry for {} nor a '{}' entry",
            subject, DEFAULT_PROTOCOL_LABEL
        )))
    }

    pub fn select(&self, subject: &SubjectId) -> Result<NamingProtocol> {
        let label = self.select_label(subject)?;
        info!("Using naming protocol '{}' for subject {}", label, subject);
        self.protocol(label)
    }

    pub fn protocol(&self, label: &str) -> Result<NamingProtocol> {
        let body = self.protocols.get(label).ok_or_else(|| {
            PrepError::Configuration(format!("naming protocol '{}' not found", label))
        })?;
        let scans = body.as_object().ok_or_else(|| {
            PrepError::Configuration(format!(
                "naming protocol '{}' must map scan labels to entries",
                label
            ))
        })?;
        let entries = scans
            .iter()
            .map(|(scan_label, raw)| parse_entry(scan_label, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(NamingProtocol {
            label: label.to_string(),
            entries,
        })
    }
}

fn parse_entry(label: &str, value: &Value) -> Result<NamingProtocolEntry> {
    let raw: RawEntry = serde_json::from_value(value.clone()).map_err(|e| {
        PrepError::Configuration(format!("invalid naming protocol entry '{}': {}", label, e))
    })?;
    let missing = |field: &str| {
        PrepError::Configuration(format!(
            "naming protocol entry '{}' is missing '{}'",
            label, field
        ))
    };
    let kind = match raw.kind {
        RawKind::Task => ScanKind::Task {
            match_protocol_name: single_pattern(label, &raw.protocol_name)?,
            expected_run_count: raw.nruns.ok_or_else(|| missing("nruns"))?,
            expected_volume_count: raw.ntrs.ok_or_else(|| missing("ntrs"))?,
        },
        RawKind::Anat => ScanKind::Anatomical {
            match_protocol_name: single_pattern(label, &raw.protocol_name)?,
            modality: raw
                .modality
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ANAT_MODALITY.to_string()),
        },
        RawKind::Fieldmap => {
            let pair = raw.protocol_name.as_object().ok_or_else(|| {
                PrepError::Configuration(format!(
                    "fieldmap entry '{}' needs protocol_name as {{\"AP\": ..., \"PA\": ...}}",
                    label
                ))
            })?;
            let direction = |key: &str| {
                pair.get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| missing(&format!("protocol_name.{}", key)))
            };
            ScanKind::Fieldmap {
                ap_protocol_name: direction("AP")?,
                pa_protocol_name: direction("PA")?,
            }
        }
    };
    Ok(NamingProtocolEntry {
        label: label.to_string(),
        use_motion_corrected: raw.use_moco.as_ref().map(truthy).unwrap_or(false),
        kind,
    })
}

fn single_pattern(label: &str, value: &Value) -> Result<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        PrepError::Configuration(format!(
            "naming protocol entry '{}' needs protocol_name as a string",
            label
        ))
    })
}

/// Scan lists write this flag as `"yes"`/`"no"`, `true`/`false`, or `1`/`0`.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !matches!(s.as_str(), "" | "no" | "n" | "false" | "0")
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = r#"{
        "default": {
            "TSK": {"type": "task", "protocol_name": "BOLD_TSK", "nruns": 4, "ntrs": 210},
            "anat": {"type": "anat", "protocol_name": "MPRAGE"},
            "ALL_SE": {"type": "fieldmap", "protocol_name": {"AP": "SE_AP", "PA": "SE_PA"}}
        },
        "s005_repeat": {
            "TSK": {"type": "task", "protocol_name": "BOLD_TSK", "nruns": 3, "ntrs": 210, "useMoCo": "yes"}
        }
    }"#;

    fn subject(raw: &str) -> SubjectId {
        SubjectId::parse(raw).unwrap()
    }

    #[test]
    fn test_subject_override_wins() {
        let doc = ProtocolDocument::from_json(DOC).unwrap();
        let protocol = doc.select(&subject("005")).unwrap();
        assert_eq!(protocol.label, "s005_repeat");
        assert_eq!(protocol.entries.len(), 1);
        assert!(protocol.entries[0].use_motion_corrected);
    }

    #[test]
    fn test_default_fallback_keeps_document_order() {
        let doc = ProtocolDocument::from_json(DOC).unwrap();
        let protocol = doc.select(&subject("s001")).unwrap();
        assert_eq!(protocol.label, "default");
        let labels: Vec<_> = protocol.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["TSK", "anat", "ALL_SE"]);

        assert_eq!(
            protocol.entries[1].kind,
            ScanKind::Anatomical {
                match_protocol_name: "MPRAGE".to_string(),
                modality: "T1w".to_string(),
            }
        );
        assert_eq!(
            protocol.entries[2].kind,
            ScanKind::Fieldmap {
                ap_protocol_name: "SE_AP".to_string(),
                pa_protocol_name: "SE_PA".to_string(),
            }
        );
        assert!(!protocol.entries[0].use_motion_corrected);
    }

    #[test]
    fn test_no_override_and_no_default_is_configuration_error() {
        let doc = ProtocolDocument::from_json(r#"{"s002": {}}"#).unwrap();
        assert!(matches!(
            doc.select(&subject("s001")),
            Err(PrepError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let doc = ProtocolDocument::from_json(
            r#"{"default": {"dwi": {"type": "diffusion", "protocol_name": "DTI"}}}"#,
        )
        .unwrap();
        let err = doc.protocol("default").unwrap_err();
        assert!(err.to_string().contains("dwi"));
    }

    #[test]
    fn test_task_requires_counts() {
        let doc = ProtocolDocument::from_json(
            r#"{"default": {"TSK": {"type": "task", "protocol_name": "BOLD", "nruns": 2}}}"#,
        )
        .unwrap();
        let err = doc.protocol("default").unwrap_err();
        assert!(err.to_string().contains("ntrs"));
    }

    #[test]
    fn test_fieldmap_requires_both_directions() {
        let doc = ProtocolDocument::from_json(
            r#"{"default": {"ALL_SE": {"type": "fieldmap", "protocol_name": {"AP": "SE_AP"}}}}"#,
        )
        .unwrap();
        assert!(matches!(
            doc.protocol("default"),
            Err(PrepError::Configuration(_))
        ));
    }

    #[test]
    fn test_motion_corrected_flag_spellings() {
        assert!(!truthy(&json!("no")));
        assert!(!truthy(&json!("N")));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!("yes")));
        assert!(truthy(&json!("y")));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
    }
}
