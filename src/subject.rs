use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static SUBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^s?([0-9]{3})$").expect("subject pattern is valid"));

/// A subject identifier in canonical `s` + 3-digit form (e.g. `s007`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectId(String);

impl SubjectId {
    /// Normalize a user-supplied id. A bare 3-digit code gets the `s` prefix.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let caps = SUBJECT_PATTERN.captures(trimmed).ok_or_else(|| {
            PrepError::InvalidArgument(format!("{} is not a valid subject ID", raw))
        })?;
        Ok(Self(format!("s{}", &caps[1])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SubjectId {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
