use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::config::GeminiParams;
use crate::error::AnalysisError;
use crate::gemini::{GeminiRequest, GeminiResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Single-shot client for Gemini's `generateContent`.
///
/// Everything it needs, API key included, is handed over at construction.
/// One `analyze` call issues exactly one request: no retries, no batching.
#[derive(Debug)]
pub struct LlmClient {
    http_client: Arc<reqwest::Client>,
    params: GeminiParams,
    timeout: Duration,
}

/// Renders a reqwest error with its causes, minus the url (it carries the api key).
fn describe_transport_error(e: reqwest::Error) -> String {
    let e = e.without_url();
    let mut message = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl LlmClient {
    pub fn new(http_client: Arc<reqwest::Client>, params: GeminiParams) -> Self {
        let timeout = Duration::from_secs(params.timeout_secs);
        Self { http_client, params, timeout }
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn params(&self) -> &GeminiParams {
        &self.params
    }

    fn build_target_url(params: &GeminiParams) -> String {
        let api_base = &params.api_base;
        let path = format!("models/{}:generateContent", params.model);
        if api_base.ends_with('/') { format!("{}{}", api_base, path) } else { format!("{}/{}", api_base, path) }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let payload = GeminiRequest::from(request);
        let target_url = Self::build_target_url(&self.params);

        info!(
            "Forwarding {} byte {} image to: {}",
            request.image_bytes.len(),
            request.mime_type,
            target_url
        );

        let response = self
            .http_client
            .post(&target_url)
            .query(&[("key", self.params.api_key.as_str())])
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let detail = describe_transport_error(e);
                warn!("Failed to reach Gemini: {}", detail);
                AnalysisError::TransportFailure(detail)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            let detail = describe_transport_error(e);
            warn!("Failed to read Gemini response body: {}", detail);
            AnalysisError::TransportFailure(detail)
        })?;

        if !status.is_success() {
            warn!("Gemini request failed with status {}: {}", status, body);
            return Err(AnalysisError::TransportFailure(format!("{}: {}", status, body)));
        }

        debug!("Gemini response body: {}", body);
        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to decode Gemini response: {}", e);
            AnalysisError::MalformedResponse(e.to_string())
        })?;

        let text = parsed.first_text()?;
        Ok(AnalysisResult { text })
    }
}
