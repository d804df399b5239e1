use crate::error::{PrepError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Shell-style filename pattern (`*`, `?`, `[...]`) matched against a
/// file name, never against directory components.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    source: String,
    regex: Regex,
    /// Leading-dot names only match when the pattern itself starts with `.`
    dotfiles: bool,
}

impl FilenamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut re = String::with_capacity(pattern.len() + 8);
        re.push('^');
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => re.push_str("[^/]*"),
                '?' => re.push_str("[^/]"),
                '[' => {
                    let mut class = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == ']' && !class.is_empty() && class != "!" {
                            closed = true;
                            break;
                        }
                        class.push(n);
                    }
                    if !closed {
                        return Err(PrepError::InvalidArgument(format!(
                            "unterminated character class in pattern '{}'",
                            pattern
                        )));
                    }
                    re.push('[');
                    re.push_str(&class_body(&class));
                    re.push(']');
                }
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| {
            PrepError::InvalidArgument(format!("invalid filename pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            dotfiles: pattern.starts_with('.'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, file_name: &str) -> bool {
        if !self.dotfiles && file_name.starts_with('.') {
            return false;
        }
        self.regex.is_match(file_name)
    }

    /// Regular files directly inside `dir` whose names match, sorted by path.
    pub fn files_in(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => PrepError::Io(io),
                None => PrepError::Parse(format!("filesystem loop under {}", dir.display())),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.matches(name) {
                    found.push(entry.into_path());
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// Number of matching files directly inside `dir`.
    pub fn count_in(&self, dir: &Path) -> Result<usize> {
        Ok(self.files_in(dir)?.len())
    }
}

/// Regex class body for a glob `[...]` body. Characters with class meaning
/// in regex but not in globs are escaped.
fn class_body(body: &str) -> String {
    let (negated, body) = match body.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let mut out = String::with_capacity(body.len() + 4);
    if negated {
        out.push('^');
    }
    let mut prev = None;
    for c in body.chars() {
        if matches!(c, '\\' | '[' | ']' | '&' | '~' | '^') || (c == '-' && prev == Some('-')) {
            out.push('\\');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_wildcards() {
        let p = FilenamePattern::new("scan_*.json").unwrap();
        assert!(p.matches("scan_01.json"));
        assert!(p.matches("scan_.json"));
        assert!(!p.matches("scan_01.jsonx"));
        assert!(!p.matches("xscan_01.json"));

        let q = FilenamePattern::new("12-?.dcm").unwrap();
        assert!(q.matches("12-1.dcm"));
        assert!(!q.matches("12-10.dcm"));
    }

    #[test]
    fn test_dots_are_literal() {
        let p = FilenamePattern::new("*.json").unwrap();
        assert!(!p.matches("metadata_json"));
    }

    #[test]
    fn test_character_classes() {
        let p = FilenamePattern::new("s[0-9][0-9][0-9]_*").unwrap();
        assert!(p.matches("s001_run1.txt"));
        assert!(!p.matches("sab1_run1.txt"));

        let negated = FilenamePattern::new("[!x]*").unwrap();
        assert!(negated.matches("abc"));
        assert!(!negated.matches("xyz"));

        assert!(FilenamePattern::new("[abc").is_err());
    }

    #[test]
    fn test_class_bodies_are_literal() {
        let bracket = FilenamePattern::new("scan_[[]*").unwrap();
        assert!(bracket.matches("scan_[1].json"));
        assert!(!bracket.matches("scan_1.json"));

        let ops = FilenamePattern::new("x[&~]y").unwrap();
        assert!(ops.matches("x&y"));
        assert!(ops.matches("x~y"));
        assert!(!ops.matches("xay"));

        let caret = FilenamePattern::new("[^a]").unwrap();
        assert!(caret.matches("^"));
        assert!(caret.matches("a"));
        assert!(!caret.matches("b"));

        let close = FilenamePattern::new("[]a]").unwrap();
        assert!(close.matches("]"));
        let negated_close = FilenamePattern::new("[!]]").unwrap();
        assert!(negated_close.matches("x"));
        assert!(!negated_close.matches("]"));
    }

    #[test]
    fn test_hidden_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scan_01.json"), "{}").unwrap();
        fs::write(dir.path().join("._scan_01.json"), [0xff_u8, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join(".hidden.par"), "").unwrap();

        let p = FilenamePattern::new("*.json").unwrap();
        assert!(!p.matches("._scan_01.json"));
        assert_eq!(p.files_in(dir.path()).unwrap(), vec![dir.path().join("scan_01.json")]);
        assert!(!FilenamePattern::new("?hidden.par").unwrap().matches(".hidden.par"));

        let explicit = FilenamePattern::new(".*.par").unwrap();
        assert!(explicit.matches(".hidden.par"));
    }

    #[test]
    fn test_files_in_skips_directories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();
        fs::create_dir(dir.path().join("d.json")).unwrap();

        let p = FilenamePattern::new("*.json").unwrap();
        let files = p.files_in(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}
