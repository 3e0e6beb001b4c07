use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How bad a detector thinks a defect is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    #[default]
    Minor,
    Major,
    Critical,
}

/// One defect reported by an upstream detector. Read-only to refit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectRecord {
    /// Defect category tag, e.g. `magic-literal` or `long-method`.
    pub category: String,
    pub file: PathBuf,
    /// First affected line (1-indexed).
    pub start_line: usize,
    /// Last affected line (inclusive). Defaults to `start_line`.
    #[serde(default)]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub message: String,
    /// Name of the affected element (method, variable, import...), when known.
    #[serde(default)]
    pub element: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    /// Whether the detector considers the defect mechanically fixable. Default: true.
    #[serde(default)]
    pub auto_fix_available: Option<bool>,
}

impl DefectRecord {
    pub fn new(category: &str, file: impl Into<PathBuf>, start_line: usize) -> Self {
        Self {
            category: category.to_string(),
            file: file.into(),
            start_line,
            end_line: None,
            message: String::new(),
            element: None,
            severity: Severity::default(),
            auto_fix_available: None,
        }
    }

    pub fn with_element(mut self, element: &str) -> Self {
        self.element = Some(element.to_string());
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn with_end_line(mut self, end_line: usize) -> Self {
        self.end_line = Some(end_line);
        self
    }

    pub fn end_line(&self) -> usize {
        self.end_line.unwrap_or(self.start_line).max(self.start_line)
    }

    pub fn auto_fixable(&self) -> bool {
        self.auto_fix_available.unwrap_or(true)
    }

    pub fn element(&self) -> Option<&str> {
        self.element.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// Category in canonical kebab-case: `Magic_Number` and `magic number` become `magic-number`.
    pub fn normalized_category(&self) -> String {
        self.category
            .trim()
            .to_lowercase()
            .replace(['_', ' '], "-")
    }

    pub fn covers_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line()
    }
}
