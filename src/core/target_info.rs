//! Per-target metadata emitted by the build aspect.
//!
//! One [`TargetInfo`] per build-graph node, deserialized from the aspect's
//! output files. Values are immutable after ingestion; repository-name
//! canonicalization produces a fresh copy rather than editing in place.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::label::Label;
use crate::core::language::LanguageClass;
use crate::core::workspace::RepoMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    #[default]
    Compile,
    Runtime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Label,
    #[serde(default)]
    pub kind: DependencyKind,
}

/// Location of a file in aspect output, relative either to the workspace
/// root or to an execution-root fragment for generated/external files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLocation {
    pub relative_path: String,
    pub is_source: bool,
    pub is_external: bool,
    pub root_execution_path_fragment: String,
}

impl Default for FileLocation {
    fn default() -> Self {
        FileLocation {
            relative_path: String::new(),
            is_source: true,
            is_external: false,
            root_execution_path_fragment: String::new(),
        }
    }
}

impl FileLocation {
    pub fn source(relative_path: impl Into<String>) -> Self {
        FileLocation {
            relative_path: relative_path.into(),
            ..Default::default()
        }
    }

    pub fn generated(relative_path: impl Into<String>, fragment: impl Into<String>) -> Self {
        FileLocation {
            relative_path: relative_path.into(),
            is_source: false,
            is_external: false,
            root_execution_path_fragment: fragment.into(),
        }
    }
}

/// One compilation output group: the runtime jars, their ABI-only
/// counterparts and the matching source jars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmOutputs {
    pub binary_jars: Vec<FileLocation>,
    pub interface_jars: Vec<FileLocation>,
    pub source_jars: Vec<FileLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmTargetInfo {
    pub jars: Vec<JvmOutputs>,
    pub generated_jars: Vec<JvmOutputs>,
    pub jdeps: Option<FileLocation>,
    pub transitive_compile_time_jars: Vec<FileLocation>,
    pub main_class: Option<String>,
    pub args: Vec<String>,
    pub jvm_flags: Vec<String>,
}

impl JvmTargetInfo {
    /// Combined jar count across output groups, used to pick the richest
    /// variant when the aspect reports several build configurations.
    pub fn jar_count(&self) -> usize {
        self.jars
            .iter()
            .chain(self.generated_jars.iter())
            .map(|j| j.binary_jars.len() + j.interface_jars.len() + j.source_jars.len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlincPluginInfo {
    pub plugin_jars: Vec<FileLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinTargetInfo {
    pub stdlibs: Vec<FileLocation>,
    pub kotlinc_plugin_infos: Vec<KotlincPluginInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalaTargetInfo {
    pub compiler_classpath: Vec<FileLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidTargetInfo {
    pub aidl_binary_jar: Option<FileLocation>,
    pub aidl_source_jar: Option<FileLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoTargetInfo {
    pub import_path: String,
    pub root: Option<FileLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonTargetInfo {
    pub is_code_generator: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CppTargetInfo {
    pub headers: Vec<FileLocation>,
}

/// Everything the aspect reports about one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    pub id: Label,
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub sources: Vec<FileLocation>,
    #[serde(default)]
    pub generated_sources: Vec<FileLocation>,
    #[serde(default)]
    pub resources: Vec<FileLocation>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub env_inherit: Vec<String>,
    #[serde(default)]
    pub executable: bool,
    #[serde(default)]
    pub jvm_target_info: Option<JvmTargetInfo>,
    #[serde(default)]
    pub kotlin_target_info: Option<KotlinTargetInfo>,
    #[serde(default)]
    pub scala_target_info: Option<ScalaTargetInfo>,
    #[serde(default)]
    pub android_target_info: Option<AndroidTargetInfo>,
    #[serde(default)]
    pub go_target_info: Option<GoTargetInfo>,
    #[serde(default)]
    pub python_target_info: Option<PythonTargetInfo>,
    #[serde(default)]
    pub cpp_target_info: Option<CppTargetInfo>,
}

impl TargetInfo {
    pub fn new(id: Label, kind: impl Into<String>) -> Self {
        TargetInfo {
            id,
            kind: kind.into(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            sources: Vec::new(),
            generated_sources: Vec::new(),
            resources: Vec::new(),
            env: BTreeMap::new(),
            env_inherit: Vec::new(),
            executable: false,
            jvm_target_info: None,
            kotlin_target_info: None,
            scala_target_info: None,
            android_target_info: None,
            go_target_info: None,
            python_target_info: None,
            cpp_target_info: None,
        }
    }

    pub fn compile_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Compile)
    }

    pub fn dependency_ids(&self) -> impl Iterator<Item = Label> + '_ {
        self.dependencies.iter().map(|d| d.id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Language set: the kind table unioned with source-extension
    /// inference and the explicit per-language facets, so a kind-opaque
    /// rule with `.java` sources still reads as a Java target.
    pub fn languages(&self) -> BTreeSet<LanguageClass> {
        let mut languages = LanguageClass::from_kind(&self.kind);
        for source in &self.sources {
            if let Some(language) =
                LanguageClass::from_source_path(Path::new(&source.relative_path))
            {
                languages.insert(language);
            }
        }
        if self.kotlin_target_info.is_some() {
            languages.insert(LanguageClass::Kotlin);
        }
        if self.scala_target_info.is_some() {
            languages.insert(LanguageClass::Scala);
        }
        if self.python_target_info.is_some() {
            languages.insert(LanguageClass::Python);
        }
        if self.go_target_info.is_some() {
            languages.insert(LanguageClass::Go);
        }
        if self.android_target_info.is_some() {
            languages.insert(LanguageClass::Android);
        }
        if self.cpp_target_info.is_some() {
            languages.insert(LanguageClass::Cpp);
        }
        languages
    }

    /// Combined jar count; zero for targets without JVM outputs.
    pub fn jar_count(&self) -> usize {
        self.jvm_target_info.as_ref().map_or(0, JvmTargetInfo::jar_count)
    }

    /// Rewrite apparent repository names in the id and every dependency id
    /// to their canonical form, into a fresh value.
    pub fn canonicalized(&self, mapping: &RepoMapping) -> TargetInfo {
        let canonicalize = |label: Label| -> Label {
            if !label.is_apparent() {
                return label;
            }
            match mapping.canonical_name(label.repo_name()) {
                Some(canonical) => label.with_canonical_repo(canonical),
                None => label,
            }
        };

        let mut out = self.clone();
        out.id = canonicalize(self.id);
        for dep in &mut out.dependencies {
            dep.id = canonicalize(dep.id);
        }
        out
    }

    /// Paths of all binary jars, relative form as reported by the aspect.
    pub fn binary_jar_paths(&self) -> impl Iterator<Item = &FileLocation> {
        self.jvm_target_info
            .iter()
            .flat_map(|jvm| jvm.jars.iter())
            .flat_map(|group| group.binary_jars.iter())
    }

    pub fn interface_jar_paths(&self) -> impl Iterator<Item = &FileLocation> {
        self.jvm_target_info
            .iter()
            .flat_map(|jvm| jvm.jars.iter())
            .flat_map(|group| group.interface_jars.iter())
    }

    pub fn source_jar_paths(&self) -> impl Iterator<Item = &FileLocation> {
        self.jvm_target_info
            .iter()
            .flat_map(|jvm| jvm.jars.iter())
            .flat_map(|group| group.source_jars.iter())
    }

    pub fn generated_jar_groups(&self) -> impl Iterator<Item = &JvmOutputs> {
        self.jvm_target_info
            .iter()
            .flat_map(|jvm| jvm.generated_jars.iter())
    }
}

/// Resolves aspect-relative [`FileLocation`]s to absolute paths.
#[derive(Debug, Clone)]
pub struct PathsResolver {
    pub workspace_root: PathBuf,
    pub execution_root: PathBuf,
}

impl PathsResolver {
    pub fn new(workspace_root: impl Into<PathBuf>, execution_root: impl Into<PathBuf>) -> Self {
        PathsResolver {
            workspace_root: workspace_root.into(),
            execution_root: execution_root.into(),
        }
    }

    pub fn resolve(&self, location: &FileLocation) -> PathBuf {
        if location.root_execution_path_fragment.is_empty() && !location.is_external {
            self.workspace_root.join(&location.relative_path)
        } else {
            self.execution_root
                .join(&location.root_execution_path_fragment)
                .join(&location.relative_path)
        }
    }

    /// Base directory of a target's package inside the workspace.
    pub fn package_dir(&self, label: &Label) -> PathBuf {
        self.workspace_root.join(label.package_dir())
    }
}
