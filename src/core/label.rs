//! Build target labels.
//!
//! A [`Label`] uniquely identifies a target: `//path/to/pkg:name` in the
//! main workspace, `@repo//pkg:name` (apparent) or `@@repo//pkg:name`
//! (canonical) in an external repository, or a synthetic label minted by
//! the resolver for jars with no backing target.
//!
//! Labels are stored in normalized form on top of an interned string, so
//! they are `Copy`, hash in O(1) and compare by pointer.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::util::hash::short_digest;
use crate::util::interning::InternedString;

const SYNTHETIC_TAG: &str = "[synthetic]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label `{0}` contains whitespace")]
    ContainsWhitespace(String),
    #[error("label `{0}` is empty")]
    Empty(String),
}

/// A normalized target label.
///
/// Normalization drops a `:name` suffix that repeats the last package
/// segment, so `//foo/bar:bar` and `//foo/bar` intern to the same value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(InternedString);

impl Label {
    /// Parse and normalize a label string.
    pub fn parse(value: &str) -> Result<Label, LabelError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(LabelError::Empty(value.to_string()));
        }
        if value.contains(char::is_whitespace) {
            return Err(LabelError::ContainsWhitespace(value.to_string()));
        }
        if value.ends_with(SYNTHETIC_TAG) {
            return Ok(Label(InternedString::new(value)));
        }

        let (repo, rest) = match value.find("//") {
            Some(idx) => (&value[..idx], &value[idx + 2..]),
            None => ("", value),
        };
        let (package, name) = match rest.find(':') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, rest.rsplit('/').next().unwrap_or(rest)),
        };

        let mut normalized = String::with_capacity(value.len());
        normalized.push_str(repo);
        normalized.push_str("//");
        normalized.push_str(package);
        if package.rsplit('/').next() != Some(name) {
            normalized.push(':');
            normalized.push_str(name);
        }
        Ok(Label(InternedString::new(normalized)))
    }

    /// Mint a synthetic label for a jar with no backing target.
    ///
    /// The label is the sanitized file name joined with a short digest of
    /// the full path, so equal paths always map to the same label and
    /// same-named jars in different locations never collide.
    pub fn synthetic(path: &std::path::Path) -> Label {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let sanitized: String = file_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '_' { c } else { '-' })
            .collect();
        let digest = short_digest(&path.to_string_lossy());
        Label(InternedString::new(format!(
            "{sanitized}-{digest}{SYNTHETIC_TAG}"
        )))
    }

    /// Mint a synthetic label from a bare name (shared SDK libraries,
    /// per-target generated-jar libraries). Same-named inputs deliberately
    /// collide so dedup-by-label merges them.
    pub fn synthetic_named(name: &str) -> Label {
        let name = name.strip_suffix(SYNTHETIC_TAG).unwrap_or(name);
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '-' })
            .collect();
        Label(InternedString::new(format!("{sanitized}{SYNTHETIC_TAG}")))
    }

    /// The normalized string form.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }

    pub fn is_synthetic(&self) -> bool {
        self.as_str().ends_with(SYNTHETIC_TAG)
    }

    /// Repository name without `@` markers; empty for the main workspace.
    pub fn repo_name(&self) -> &str {
        match self.as_str().find("//") {
            Some(idx) => self.as_str()[..idx].trim_start_matches('@'),
            None => "",
        }
    }

    pub fn is_main_workspace(&self) -> bool {
        self.repo_name().is_empty() && !self.is_synthetic()
    }

    /// True for `@repo//...` labels whose repo name has not been resolved
    /// to its canonical form.
    pub fn is_apparent(&self) -> bool {
        let s = self.as_str();
        s.starts_with('@') && !s.starts_with("@@")
    }

    /// Package path segment, e.g. `path/to/pkg` for `//path/to/pkg:name`.
    pub fn package_path(&self) -> &str {
        let s = self.as_str();
        let rest = match s.find("//") {
            Some(idx) => &s[idx + 2..],
            None => return "",
        };
        match rest.find(':') {
            Some(idx) => &rest[..idx],
            None => rest,
        }
    }

    /// Target name, e.g. `name` for `//path/to/pkg:name`.
    pub fn target_name(&self) -> &str {
        let s = self.as_str();
        if self.is_synthetic() {
            return s;
        }
        let rest = match s.find("//") {
            Some(idx) => &s[idx + 2..],
            None => s,
        };
        match rest.find(':') {
            Some(idx) => &rest[idx + 1..],
            None => rest.rsplit('/').next().unwrap_or(rest),
        }
    }

    /// Rewrite an apparent repository name to its canonical form.
    pub fn with_canonical_repo(&self, canonical: &str) -> Label {
        let s = self.as_str();
        let rest = match s.find("//") {
            Some(idx) => &s[idx..],
            None => return *self,
        };
        Label(InternedString::new(format!("@@{canonical}{rest}")))
    }

    /// Package path as a relative filesystem path.
    pub fn package_dir(&self) -> PathBuf {
        PathBuf::from(self.package_path())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Label::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_main_workspace() {
        let label = Label::parse("//path/to/pkg:name").unwrap();
        assert_eq!(label.as_str(), "//path/to/pkg:name");
        assert_eq!(label.package_path(), "path/to/pkg");
        assert_eq!(label.target_name(), "name");
        assert!(label.is_main_workspace());
        assert!(!label.is_synthetic());
    }

    #[test]
    fn test_parse_normalizes_repeated_name() {
        let short = Label::parse("//foo/bar").unwrap();
        let long = Label::parse("//foo/bar:bar").unwrap();
        assert_eq!(short, long);
        assert_eq!(short.as_str(), "//foo/bar");
        assert_eq!(short.target_name(), "bar");
    }

    #[test]
    fn test_parse_external_repos() {
        let apparent = Label::parse("@maven//:guava").unwrap();
        assert!(apparent.is_apparent());
        assert_eq!(apparent.repo_name(), "maven");
        assert!(!apparent.is_main_workspace());

        let canonical = Label::parse("@@rules_jvm~~maven//:guava").unwrap();
        assert!(!canonical.is_apparent());
        assert_eq!(canonical.repo_name(), "rules_jvm~~maven");
    }

    #[test]
    fn test_parse_rejects_whitespace() {
        assert!(matches!(
            Label::parse("//foo :bar"),
            Err(LabelError::ContainsWhitespace(_))
        ));
    }

    #[test]
    fn test_synthetic_stability_and_collision() {
        let a1 = Label::synthetic(Path::new("external/maven/com/guava/guava-31.jar"));
        let a2 = Label::synthetic(Path::new("external/maven/com/guava/guava-31.jar"));
        let b = Label::synthetic(Path::new("external/other/com/guava/guava-31.jar"));

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert!(a1.is_synthetic());
        assert!(a1.as_str().starts_with("guava-31.jar-"));
        assert!(a1.as_str().ends_with("[synthetic]"));
    }

    #[test]
    fn test_with_canonical_repo() {
        let apparent = Label::parse("@maven//:guava").unwrap();
        let canonical = apparent.with_canonical_repo("rules_jvm~~maven");
        assert_eq!(canonical.as_str(), "@@rules_jvm~~maven//:guava");
        assert!(!canonical.is_apparent());
    }
}
