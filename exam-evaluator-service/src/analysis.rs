//! Document analysis: PDF download plus an Azure AI Document Intelligence
//! read job, reduced to the text and metadata the grader needs.

mod client;
mod responses;

pub use client::DocumentIntelligenceClient;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::AnalysisError;

use responses::AnalyzeResult;

/// Text and summary metadata extracted from one document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysis {
    pub extracted_text: String,
    pub page_count: usize,
    pub table_count: usize,
    /// Mean per-line OCR confidence, 0.0 when no lines were found
    pub average_confidence: f64,
}

impl DocumentAnalysis {
    /// Length of the extracted text in characters
    pub fn text_length(&self) -> usize {
        self.extracted_text.chars().count()
    }
}

impl From<AnalyzeResult> for DocumentAnalysis {
    fn from(result: AnalyzeResult) -> Self {
        let average_confidence = result.average_line_confidence();
        Self {
            page_count: result.pages.len(),
            table_count: result.tables.len(),
            average_confidence,
            extracted_text: result.content,
        }
    }
}

/// Produces a [`DocumentAnalysis`] for a PDF reachable at a URL
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, document_url: &Url) -> Result<DocumentAnalysis, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_result(json: serde_json::Value) -> AnalyzeResult {
        serde_json::from_value(json).unwrap()
    }

    fn page_with_confidences(confidences: &[f64]) -> serde_json::Value {
        let lines: Vec<_> = confidences
            .iter()
            .map(|c| serde_json::json!({ "content": "line", "confidence": c }))
            .collect();
        serde_json::json!({ "pageNumber": 1, "lines": lines })
    }

    #[test]
    fn test_two_pages_one_table_ten_lines() {
        let result = analyze_result(serde_json::json!({
            "content": "Q1. Photosynthesis converts light to chemical energy.",
            "pages": [
                page_with_confidences(&[0.9; 6]),
                page_with_confidences(&[0.9; 4]),
            ],
            "tables": [{ "rowCount": 2, "columnCount": 2, "cells": [] }],
        }));

        let analysis = DocumentAnalysis::from(result);
        assert_eq!(analysis.page_count, 2);
        assert_eq!(analysis.table_count, 1);
        assert!((analysis.average_confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_no_lines_gives_zero_confidence() {
        let result = analyze_result(serde_json::json!({
            "content": "",
            "pages": [{ "pageNumber": 1, "lines": [] }, { "pageNumber": 2 }],
        }));

        let analysis = DocumentAnalysis::from(result);
        assert_eq!(analysis.page_count, 2);
        assert_eq!(analysis.table_count, 0);
        assert_eq!(analysis.average_confidence, 0.0);
    }

    #[test]
    fn test_confidence_is_mean_across_pages() {
        let result = analyze_result(serde_json::json!({
            "pages": [
                page_with_confidences(&[1.0, 0.5]),
                page_with_confidences(&[0.0]),
            ],
        }));

        let analysis = DocumentAnalysis::from(result);
        assert!((analysis.average_confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_line_confidence_counts_as_zero() {
        let result = analyze_result(serde_json::json!({
            "pages": [{ "lines": [{ "content": "a" }, { "content": "b", "confidence": 0.8 }] }],
        }));

        let analysis = DocumentAnalysis::from(result);
        assert!((analysis.average_confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_defaults() {
        let analysis = DocumentAnalysis::from(analyze_result(serde_json::json!({})));
        assert_eq!(analysis.extracted_text, "");
        assert_eq!(analysis.page_count, 0);
        assert_eq!(analysis.table_count, 0);
        assert_eq!(analysis.average_confidence, 0.0);
    }

    #[test]
    fn test_text_length_counts_characters_not_bytes() {
        let analysis = DocumentAnalysis {
            extracted_text: "Größe ∑".to_string(),
            page_count: 1,
            table_count: 0,
            average_confidence: 0.0,
        };
        assert_eq!(analysis.text_length(), 7);
    }
}
