use crate::gemini::GeminiInlineData;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variant order matters for untagged decoding: anything that is neither text
/// nor inline data (function calls, executable code...) lands in `Other`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

impl GeminiPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            GeminiPart::Text { text } => Some(text),
            _ => None,
        }
    }
}
