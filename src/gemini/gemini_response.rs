use crate::analysis::NO_CANDIDATES_TEXT;
use crate::error::AnalysisError;
use crate::gemini::{GeminiCandidate, GeminiContent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "promptFeedback")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<Value>,
    #[serde(rename = "modelVersion")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate.
    ///
    /// No candidates at all is not an error: the model simply had nothing to
    /// say (blocked prompt, empty generation) and the fixed fallback is
    /// returned. A candidate whose first part is not text is malformed.
    pub fn first_text(&self) -> Result<String, AnalysisError> {
        let candidate = match self.candidates.as_deref() {
            Some([first, ..]) => first,
            _ => {
                if let Some(feedback) = &self.prompt_feedback {
                    tracing::info!("Gemini returned no candidates, prompt feedback: {}", feedback);
                }
                return Ok(NO_CANDIDATES_TEXT.to_string());
            }
        };

        let part = candidate
            .content
            .as_ref()
            .and_then(|c: &GeminiContent| c.parts.first())
            .ok_or_else(|| {
                AnalysisError::MalformedResponse("first candidate has no content parts".to_string())
            })?;

        part.as_text().map(str::to_string).ok_or_else(|| {
            AnalysisError::MalformedResponse("first content part carries no text".to_string())
        })
    }
}
