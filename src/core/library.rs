//! Library value objects.
//!
//! A library is a non-module dependency: a label plus the jar sets it
//! contributes to the classpath. Derivation passes may produce several
//! instances for one label; the mapper merges them into a single canonical
//! map with explicit precedence.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::label::Label;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub label: Label,
    pub outputs: BTreeSet<PathBuf>,
    pub sources: BTreeSet<PathBuf>,
    pub interface_jars: BTreeSet<PathBuf>,
    pub dependencies: Vec<Label>,
    pub maven_coordinates: Option<String>,
    /// The library wraps outputs of a workspace target rather than a
    /// fetched artifact.
    pub is_from_internal_target: bool,
    /// Appended after declared dependencies at assembly so user-declared
    /// equivalents take precedence (project-level stdlib libraries).
    pub is_low_priority: bool,
}

impl Library {
    pub fn new(label: Label) -> Self {
        Library {
            label,
            outputs: BTreeSet::new(),
            sources: BTreeSet::new(),
            interface_jars: BTreeSet::new(),
            dependencies: Vec::new(),
            maven_coordinates: None,
            is_from_internal_target: false,
            is_low_priority: false,
        }
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_interface_jars(mut self, jars: impl IntoIterator<Item = PathBuf>) -> Self {
        self.interface_jars.extend(jars);
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = Label>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    pub fn from_internal_target(mut self) -> Self {
        self.is_from_internal_target = true;
        self
    }

    pub fn low_priority(mut self) -> Self {
        self.is_low_priority = true;
        self
    }

    /// Infer maven coordinates from the first output jar, if it follows a
    /// maven repository layout.
    pub fn with_inferred_maven_coordinates(mut self) -> Self {
        self.maven_coordinates = self
            .outputs
            .iter()
            .next()
            .and_then(|jar| infer_maven_coordinates(jar));
        self
    }

    /// A toolchain placeholder: every jar is `empty.jar` and nothing else
    /// is attached. Such candidates never become libraries.
    pub fn is_empty_placeholder(&self) -> bool {
        let only_empty = |jars: &BTreeSet<PathBuf>| {
            jars.iter()
                .all(|j| j.file_name().is_some_and(|n| n == "empty.jar"))
        };
        !self.outputs.is_empty()
            && only_empty(&self.outputs)
            && only_empty(&self.interface_jars)
            && only_empty(&self.sources)
            && self.dependencies.is_empty()
    }
}

/// Derive `group:artifact:version` from a maven-layout jar path, e.g.
/// `external/maven/.../maven2/com/google/guava/guava/31.1/guava-31.1.jar`.
pub fn infer_maven_coordinates(jar: &Path) -> Option<String> {
    let file_stem = jar.file_stem()?.to_str()?;
    let version_dir = jar.parent()?;
    let version = version_dir.file_name()?.to_str()?;
    let artifact_dir = version_dir.parent()?;
    let artifact = artifact_dir.file_name()?.to_str()?;

    if file_stem != format!("{artifact}-{version}") {
        return None;
    }

    // Group segments sit between the repository root marker and the
    // artifact directory
    let mut group_segments: Vec<&str> = Vec::new();
    let mut seen_marker = false;
    for segment in artifact_dir.parent()?.components() {
        let segment = segment.as_os_str().to_str()?;
        if seen_marker {
            group_segments.push(segment);
        } else if segment == "maven2" || segment == "m2" {
            seen_marker = true;
        }
    }
    if !seen_marker || group_segments.is_empty() {
        return None;
    }

    Some(format!("{}:{artifact}:{version}", group_segments.join(".")))
}

/// A Go package exposed to the IDE model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoLibrary {
    pub label: Label,
    pub import_path: Option<String>,
    pub root: Option<PathBuf>,
}

impl GoLibrary {
    /// Entries with neither an import path nor a root are not real
    /// libraries and are dropped by the derivation pass.
    pub fn is_resolvable(&self) -> bool {
        self.import_path.as_ref().is_some_and(|p| !p.is_empty()) || self.root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maven_coordinates_from_layout() {
        let jar = Path::new(
            "external/maven/v1/https/repo1.maven.org/maven2/com/google/guava/guava/31.1-jre/guava-31.1-jre.jar",
        );
        assert_eq!(
            infer_maven_coordinates(jar),
            Some("com.google.guava:guava:31.1-jre".to_string())
        );
    }

    #[test]
    fn test_maven_coordinates_rejected_for_plain_paths() {
        assert_eq!(
            infer_maven_coordinates(Path::new("bazel-out/bin/lib/libfoo.jar")),
            None
        );
        // File name does not match artifact-version
        assert_eq!(
            infer_maven_coordinates(Path::new("maven2/com/google/guava/31.1/other.jar")),
            None
        );
    }

    #[test]
    fn test_empty_jar_placeholder() {
        let label = Label::parse("//lib:stub").unwrap();
        let placeholder =
            Library::new(label).with_outputs([PathBuf::from("bazel-out/bin/empty.jar")]);
        assert!(placeholder.is_empty_placeholder());

        let real = Library::new(label).with_outputs([PathBuf::from("bazel-out/bin/real.jar")]);
        assert!(!real.is_empty_placeholder());

        let with_deps = Library::new(label)
            .with_outputs([PathBuf::from("bazel-out/bin/empty.jar")])
            .with_dependencies([Label::parse("//lib:dep").unwrap()]);
        assert!(!with_deps.is_empty_placeholder());
    }

    #[test]
    fn test_go_library_resolvability() {
        let label = Label::parse("//go/pkg:lib").unwrap();
        let empty = GoLibrary {
            label,
            import_path: Some(String::new()),
            root: None,
        };
        assert!(!empty.is_resolvable());

        let with_path = GoLibrary {
            label,
            import_path: Some("example.com/pkg".to_string()),
            root: None,
        };
        assert!(with_path.is_resolvable());
    }
}
