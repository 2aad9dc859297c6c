//! Source languages and the standards Berth knows how to probe for.

use serde::{Deserialize, Serialize};

/// Source language of a probe program; also the role a compiler plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// C language (default)
    #[default]
    C,
    /// C++ language
    #[serde(alias = "cpp", alias = "cxx", alias = "c++")]
    Cxx,
}

impl Language {
    /// Get the language name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }

    /// File extension used for probe sources, including the dot.
    pub fn source_extension(&self) -> &'static str {
        match self {
            Language::C => ".c",
            Language::Cxx => ".cpp",
        }
    }

    /// Infer the language from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" => Some(Language::Cxx),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A language standard whose enabling flag can be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageStandard {
    #[serde(rename = "c99")]
    C99,
    #[serde(rename = "c++11")]
    Cxx11,
}

impl LanguageStandard {
    /// The language this standard belongs to.
    pub fn language(&self) -> Language {
        match self {
            LanguageStandard::C99 => Language::C,
            LanguageStandard::Cxx11 => Language::Cxx,
        }
    }
}

impl std::fmt::Display for LanguageStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguageStandard::C99 => f.write_str("C99"),
            LanguageStandard::Cxx11 => f.write_str("C++11"),
        }
    }
}
