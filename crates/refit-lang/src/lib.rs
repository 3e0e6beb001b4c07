//! Java grammar loading, file detection and the node helpers the
//! refactoring strategies share.

pub mod java;
pub mod registry;

use serde::Serialize;
use thiserror::Error;
use tree_sitter::Language;

#[derive(Debug, Clone, Error)]
pub enum LangError {
    #[error("{0} is not a Java source file")]
    NotJava(String),

    #[error("Grammar for {0:?} is incompatible with the linked tree-sitter runtime")]
    IncompatibleGrammar(SupportedLanguage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportedLanguage {
    Java,
}

impl SupportedLanguage {
    pub fn ts_language(self) -> Language {
        match self {
            Self::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }
}

/// The grammar every strategy parses with.
pub fn java() -> Language {
    SupportedLanguage::Java.ts_language()
}
