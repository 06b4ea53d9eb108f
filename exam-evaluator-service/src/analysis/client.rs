//! Azure AI Document Intelligence client implementation.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::responses::{AnalyzeOperation, AnalyzeResult, OperationStatus};
use super::{DocumentAnalysis, DocumentAnalyzer};
use crate::config::DocumentIntelligenceConfig;
use crate::error::{AnalysisError, ServiceError, ServiceResult};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Document Intelligence API client
pub struct DocumentIntelligenceClient {
    client: Client,
    config: DocumentIntelligenceConfig,
}

impl DocumentIntelligenceClient {
    /// Create a new Document Intelligence client
    pub fn new(config: DocumentIntelligenceConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build Document Intelligence HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn analyze_url(&self) -> Result<String, AnalysisError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or(AnalysisError::NotConfigured {
                setting: "document_intelligence.endpoint",
            })?;

        Ok(format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            endpoint.trim_end_matches('/'),
            self.config.model_id,
            self.config.api_version
        ))
    }

    fn key(&self) -> Result<&str, AnalysisError> {
        self.config
            .key
            .as_deref()
            .ok_or(AnalysisError::NotConfigured {
                setting: "document_intelligence.key",
            })
    }

    /// Fetch the PDF bytes
    async fn download(&self, document_url: &Url) -> Result<Bytes, AnalysisError> {
        let response = self
            .client
            .get(document_url.clone())
            .send()
            .await
            .map_err(|source| AnalysisError::DownloadRequest {
                url: document_url.to_string(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(AnalysisError::Download {
                status: response.status().as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|source| AnalysisError::DownloadRequest {
                url: document_url.to_string(),
                source,
            })
    }

    /// Submit the PDF and return the operation location to poll
    async fn submit(&self, pdf: Bytes) -> Result<String, AnalysisError> {
        let url = self.analyze_url()?;
        let key = self.key()?;

        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(header::CONTENT_TYPE, "application/pdf")
            .body(pdf)
            .send()
            .await
            .map_err(|source| AnalysisError::SubmitRequest {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(AnalysisError::Submit {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(AnalysisError::MissingOperationLocation)
    }

    /// Poll the operation until it succeeds, fails, or the polling budget runs out
    async fn wait_for_result(
        &self,
        operation_location: &str,
    ) -> Result<AnalyzeResult, AnalysisError> {
        let key = self.key()?;
        let polling = &self.config.polling;
        let started = Instant::now();
        let mut attempts = 0;

        while attempts < polling.max_attempts {
            tokio::time::sleep(polling.interval()).await;
            attempts += 1;
            metrics::counter!("document_analysis_polls_total").increment(1);

            let response = self
                .client
                .get(operation_location)
                .header(SUBSCRIPTION_KEY_HEADER, key)
                .send()
                .await
                .map_err(|source| AnalysisError::PollRequest {
                    url: operation_location.to_string(),
                    source,
                })?;

            if !response.status().is_success() {
                return Err(AnalysisError::Poll {
                    status: response.status().as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let operation: AnalyzeOperation = response
                .json()
                .await
                .map_err(|source| AnalysisError::InvalidResponse { source })?;

            match operation.status {
                Some(OperationStatus::Succeeded) => {
                    info!(attempts, "Analysis completed successfully");
                    return Ok(operation.analyze_result.unwrap_or_default());
                }
                Some(OperationStatus::Failed) => {
                    let message = operation.error.and_then(|e| e.describe());
                    warn!(attempts, error = ?message, "Analysis job failed");
                    return Err(AnalysisError::JobFailed { message });
                }
                status => debug!(attempts, ?status, "Analysis status"),
            }

            if started.elapsed() >= polling.max_wait() {
                break;
            }
        }

        Err(AnalysisError::TimedOut {
            attempts,
            elapsed_secs: started.elapsed().as_secs(),
        })
    }
}

#[async_trait]
impl DocumentAnalyzer for DocumentIntelligenceClient {
    async fn analyze(&self, document_url: &Url) -> Result<DocumentAnalysis, AnalysisError> {
        info!(url = %document_url, "Analyzing document");

        let pdf = self.download(document_url).await?;
        info!(bytes = pdf.len(), "Downloaded PDF");

        let operation_location = self.submit(pdf).await?;
        debug!(operation_location = %operation_location, "Submitted PDF for analysis");

        let result = self.wait_for_result(&operation_location).await?;
        Ok(DocumentAnalysis::from(result))
    }
}
