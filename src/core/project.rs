//! The root project aggregate.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::label::Label;
use crate::core::library::{GoLibrary, Library};
use crate::core::module::Module;
use crate::core::workspace::RepoMapping;

/// Immutable result of one resolution. A new sync builds a fresh value;
/// partial syncs merge over a prior project via [`Project::merge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub workspace_root: PathBuf,
    pub build_tool_release: String,
    pub modules: Vec<Module>,
    pub libraries: HashMap<Label, Library>,
    pub go_libraries: HashMap<Label, GoLibrary>,
    /// Internal graph nodes that became neither modules nor libraries.
    pub non_module_targets: Vec<Label>,
    pub repo_mapping: RepoMapping,
    /// Some shard or target failed; the project still carries everything
    /// that did resolve.
    pub has_error: bool,
}

impl Project {
    /// Merge a partial re-sync over a prior project.
    ///
    /// Modules resolved by the new sync replace their old versions by
    /// label; everything else carries over. Library and go-library maps
    /// are unioned with the new entries winning. The result is a fresh
    /// value; neither input is modified.
    pub fn merge(prior: &Project, fresh: &Project) -> Project {
        let mut modules: Vec<Module> = prior
            .modules
            .iter()
            .filter(|m| !fresh.modules.iter().any(|f| f.label == m.label))
            .cloned()
            .collect();
        modules.extend(fresh.modules.iter().cloned());

        let mut libraries = prior.libraries.clone();
        libraries.extend(fresh.libraries.iter().map(|(k, v)| (*k, v.clone())));

        let mut go_libraries = prior.go_libraries.clone();
        go_libraries.extend(fresh.go_libraries.iter().map(|(k, v)| (*k, v.clone())));

        let mut non_module_targets = prior.non_module_targets.clone();
        for label in &fresh.non_module_targets {
            if !non_module_targets.contains(label) {
                non_module_targets.push(*label);
            }
        }

        Project {
            workspace_root: fresh.workspace_root.clone(),
            build_tool_release: fresh.build_tool_release.clone(),
            modules,
            libraries,
            go_libraries,
            non_module_targets,
            repo_mapping: fresh.repo_mapping.clone(),
            has_error: prior.has_error || fresh.has_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn module(label: &str, kind: &str) -> Module {
        Module {
            label: Label::parse(label).unwrap(),
            direct_dependencies: Vec::new(),
            languages: BTreeSet::new(),
            tags: BTreeSet::new(),
            base_directory: PathBuf::new(),
            sources: Vec::new(),
            resources: BTreeSet::new(),
            environment: BTreeMap::new(),
            language_data: None,
            kind: kind.to_string(),
        }
    }

    fn empty_project() -> Project {
        Project {
            workspace_root: PathBuf::from("/ws"),
            build_tool_release: "7.0.0".to_string(),
            modules: Vec::new(),
            libraries: HashMap::new(),
            go_libraries: HashMap::new(),
            non_module_targets: Vec::new(),
            repo_mapping: RepoMapping::default(),
            has_error: false,
        }
    }

    #[test]
    fn test_merge_replaces_resynced_modules() {
        let mut prior = empty_project();
        prior.modules.push(module("//lib:a", "java_library"));
        prior.modules.push(module("//lib:b", "java_library"));

        let mut fresh = empty_project();
        fresh.modules.push(module("//lib:a", "kt_jvm_library"));

        let merged = Project::merge(&prior, &fresh);
        assert_eq!(merged.modules.len(), 2);
        let a = merged
            .modules
            .iter()
            .find(|m| m.label.as_str() == "//lib:a")
            .unwrap();
        assert_eq!(a.kind, "kt_jvm_library");
    }

    #[test]
    fn test_merge_preserves_error_flag() {
        let mut prior = empty_project();
        prior.has_error = true;
        let fresh = empty_project();
        assert!(Project::merge(&prior, &fresh).has_error);
    }
}
