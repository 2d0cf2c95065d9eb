use serde::{Deserialize, Serialize};

/// Base64 image payload sent alongside the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}
