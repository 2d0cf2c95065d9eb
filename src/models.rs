use crate::analysis::PatientContext;
use serde::{Deserialize, Serialize};

/// Body accepted by `POST /analizar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// `data:<mime>;base64,<payload>`
    #[serde(default)]
    pub imagen: Option<String>,
    #[serde(default)]
    pub paciente: Option<PatientContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub resultado: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
