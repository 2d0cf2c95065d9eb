use crate::analysis::AnalysisRequest;
use crate::gemini::{GeminiContent, GeminiInlineData, GeminiPart};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Body of a `generateContent` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

impl From<&AnalysisRequest> for GeminiRequest {
    fn from(request: &AnalysisRequest) -> Self {
        // Prompt first, image second, in a single user turn
        let parts = vec![
            GeminiPart::Text {
                text: request.prompt.clone(),
            },
            GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: request.mime_type.clone(),
                    data: STANDARD.encode(&request.image_bytes),
                },
            },
        ];

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
        }
    }
}
