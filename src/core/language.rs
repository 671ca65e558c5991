//! Language classification for build targets.
//!
//! A target's language set drives module promotion, jdeps eligibility and
//! the per-language data payload attached to assembled modules. Languages
//! are inferred from the target kind, from source file extensions and from
//! the per-language facets the aspect emits.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageClass {
    Java,
    Kotlin,
    Scala,
    Python,
    Go,
    Android,
    Cpp,
}

impl LanguageClass {
    /// Languages whose compiled output lives on a JVM classpath.
    pub fn is_jvm(&self) -> bool {
        matches!(
            self,
            LanguageClass::Java | LanguageClass::Kotlin | LanguageClass::Scala | LanguageClass::Android
        )
    }

    /// Languages the debug bridge can attach to.
    pub fn is_debuggable(&self) -> bool {
        self.is_jvm() || matches!(self, LanguageClass::Python | LanguageClass::Go)
    }

    /// Languages inferred from a rule kind string.
    pub fn from_kind(kind: &str) -> BTreeSet<LanguageClass> {
        let mut langs = BTreeSet::new();
        if kind.starts_with("java_") {
            langs.insert(LanguageClass::Java);
        }
        if kind.starts_with("kt_") {
            langs.insert(LanguageClass::Kotlin);
            langs.insert(LanguageClass::Java);
        }
        if kind.starts_with("scala_") {
            langs.insert(LanguageClass::Scala);
            langs.insert(LanguageClass::Java);
        }
        if kind.starts_with("py_") {
            langs.insert(LanguageClass::Python);
        }
        if kind.starts_with("go_") {
            langs.insert(LanguageClass::Go);
        }
        if kind.starts_with("android_") {
            langs.insert(LanguageClass::Android);
            langs.insert(LanguageClass::Java);
        }
        if kind.starts_with("cc_") {
            langs.insert(LanguageClass::Cpp);
        }
        if kind == "intellij_plugin_debug_target" {
            langs.insert(LanguageClass::Java);
        }
        langs
    }

    /// Language inferred from a source file extension, if any.
    pub fn from_source_path(path: &Path) -> Option<LanguageClass> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "java" => Some(LanguageClass::Java),
            "kt" | "kts" => Some(LanguageClass::Kotlin),
            "scala" => Some(LanguageClass::Scala),
            "py" => Some(LanguageClass::Python),
            "go" => Some(LanguageClass::Go),
            "c" | "cc" | "cpp" | "cxx" | "h" | "hh" | "hpp" => Some(LanguageClass::Cpp),
            _ => None,
        }
    }
}
