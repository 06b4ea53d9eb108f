//! Response types for the Document Intelligence analyze operation.

use serde::Deserialize;
use serde::de::IgnoredAny;

/// Body of a `GET {operation-location}` poll
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOperation {
    #[serde(default)]
    pub status: Option<OperationStatus>,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationError {
    pub fn describe(&self) -> Option<String> {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (None, Some(message)) => Some(message.clone()),
            (Some(code), None) => Some(code.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pages: Vec<AnalyzedPage>,
    /// Only the count is used
    #[serde(default)]
    pub tables: Vec<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzedPage {
    #[serde(default)]
    pub lines: Vec<AnalyzedLine>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzedLine {
    #[serde(default)]
    pub confidence: f64,
}

impl AnalyzeResult {
    /// Mean of per-line confidence over every line on every page
    pub fn average_line_confidence(&self) -> f64 {
        let (total, count) = self
            .pages
            .iter()
            .flat_map(|page| &page.lines)
            .fold((0.0, 0usize), |(total, count), line| {
                (total + line.confidence, count + 1)
            });

        if count == 0 { 0.0 } else { total / count as f64 }
    }
}
