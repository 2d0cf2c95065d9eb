use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMPT: &str =
    "Analiza el siguiente electrocardiograma y proporciona un resumen de los resultados.";

/// Returned as a successful result when the model produced no candidates.
pub const NO_CANDIDATES_TEXT: &str = "No se pudo obtener una respuesta del modelo.";

/// Optional clinical context the model can correlate with the trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genero: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historial: Option<String>,
}

impl PatientContext {
    pub fn is_empty(&self) -> bool {
        [&self.edad, &self.genero, &self.historial]
            .iter()
            .all(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    }

    pub fn prompt(&self) -> String {
        fn or<'a>(field: &'a Option<String>, missing: &'a str) -> &'a str {
            match field.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => v,
                _ => missing,
            }
        }

        format!(
            "Analiza este ECG y los siguientes datos del paciente:\n\
             Edad: {}\n\
             Género: {}\n\
             Historial Clínico: {}\n\n\
             Basado en el ECG y los datos del paciente, proporciona un resumen detallado y cualquier observación relevante.",
            or(&self.edad, "no especificada"),
            or(&self.genero, "no especificado"),
            or(&self.historial, "no especificado"),
        )
    }
}

/// One image plus the prompt it is analyzed with. Lives for a single call.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
    pub prompt: String,
}

impl AnalysisRequest {
    pub fn new(image_bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            image_bytes,
            mime_type: mime_type.into(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Switches to the contextual prompt, unless the context carries nothing.
    pub fn with_patient(mut self, patient: Option<&PatientContext>) -> Self {
        if let Some(p) = patient.filter(|p| !p.is_empty()) {
            self.prompt = p.prompt();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub text: String,
}
