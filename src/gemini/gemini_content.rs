use crate::gemini::GeminiPart;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>, // "user" or "model"
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}
