use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::analysis::{DocumentAnalysis, DocumentAnalyzer};
use crate::error::ServiceResult;
use crate::generation::TextGenerator;
use crate::prompt::build_evaluation_prompt;

/// Graded output for one answer sheet
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub text_response: String,
    pub document_analysis: DocumentAnalysisSummary,
}

/// Metadata returned to the caller alongside the grading text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAnalysisSummary {
    pub pages: usize,
    pub tables: usize,
    pub confidence: f64,
    pub text_length: usize,
}

impl EvaluationResult {
    pub fn assemble(text_response: String, analysis: &DocumentAnalysis) -> Self {
        Self {
            text_response,
            document_analysis: DocumentAnalysisSummary {
                pages: analysis.page_count,
                tables: analysis.table_count,
                confidence: analysis.average_confidence,
                text_length: analysis.text_length(),
            },
        }
    }
}

/// Runs the download → analyze → prompt → generate pipeline
pub struct EvaluationService {
    analyzer: Arc<dyn DocumentAnalyzer>,
    generator: Arc<dyn TextGenerator>,
}

impl EvaluationService {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            analyzer,
            generator,
        }
    }

    /// Evaluate the answer sheet at `pdf_url`
    pub async fn evaluate_exam(&self, pdf_url: &Url) -> ServiceResult<EvaluationResult> {
        let evaluation_id = Uuid::new_v4();
        let span = info_span!("evaluate_exam", %evaluation_id, url = %pdf_url);
        let started = Instant::now();

        let result = self.run_pipeline(pdf_url).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => {
                warn!(%evaluation_id, error = %e, code = e.error_code(), "Evaluation failed");
                e.error_code()
            }
        };
        metrics::counter!("exam_evaluations_total", "outcome" => outcome).increment(1);
        metrics::histogram!("exam_evaluation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn run_pipeline(&self, pdf_url: &Url) -> ServiceResult<EvaluationResult> {
        info!("Processing exam");

        let analysis = self.analyzer.analyze(pdf_url).await?;
        info!(
            pages = analysis.page_count,
            tables = analysis.table_count,
            confidence = analysis.average_confidence,
            characters = analysis.text_length(),
            "Document analyzed"
        );
        debug!(text = %analysis.extracted_text, "Extracted text");

        let prompt = build_evaluation_prompt(&analysis);
        let text_response = self.generator.generate(&prompt).await?;
        debug!(response = %text_response, "Model response");

        Ok(EvaluationResult::assemble(text_response, &analysis))
    }
}
