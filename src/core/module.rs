//! Module value objects.
//!
//! A module is a workspace target promoted to first-class status in the
//! IDE model: resolved sources, capability tags, inferred languages and an
//! ordered direct-dependency list.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::label::Label;
use crate::core::language::LanguageClass;

/// Capability tags derived from kind, executability and declared tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Application,
    Test,
    Library,
    IntellijPlugin,
    NoIde,
    NoBuild,
    Manual,
}

impl Tag {
    /// Resolve capability tags for a target.
    pub fn from_target(kind: &str, executable: bool, declared_tags: &[String]) -> BTreeSet<Tag> {
        let mut tags = BTreeSet::new();

        if kind.ends_with("_test") || declared_tags.iter().any(|t| t == "test") {
            tags.insert(Tag::Test);
        } else if kind == "intellij_plugin_debug_target" {
            tags.insert(Tag::IntellijPlugin);
            tags.insert(Tag::Application);
        } else if executable || kind.ends_with("_binary") {
            tags.insert(Tag::Application);
        } else {
            tags.insert(Tag::Library);
        }

        for tag in declared_tags {
            match tag.as_str() {
                "no-ide" => {
                    tags.insert(Tag::NoIde);
                }
                "no-build" => {
                    tags.insert(Tag::NoBuild);
                }
                "manual" => {
                    tags.insert(Tag::Manual);
                }
                _ => {}
            }
        }
        tags
    }
}

/// A resolved source entry; generated sources live under the execution
/// root rather than the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub path: PathBuf,
    pub generated: bool,
    pub jvm_package_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "language", rename_all = "snake_case")]
pub enum LanguageData {
    Jvm {
        main_class: Option<String>,
        args: Vec<String>,
        jvm_flags: Vec<String>,
    },
    Python {
        is_code_generator: bool,
    },
    Go {
        import_path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub label: Label,
    /// Extra libraries first, declared dependencies after, low-priority
    /// libraries last.
    pub direct_dependencies: Vec<Label>,
    pub languages: BTreeSet<LanguageClass>,
    pub tags: BTreeSet<Tag>,
    pub base_directory: PathBuf,
    pub sources: Vec<SourceItem>,
    pub resources: BTreeSet<PathBuf>,
    pub environment: BTreeMap<String, String>,
    pub language_data: Option<LanguageData>,
    pub kind: String,
}
