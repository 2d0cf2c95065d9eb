use thiserror::Error;

/// Everything that can go wrong while turning an uploaded image into an analysis.
///
/// The display strings are what callers end up showing to users, so they stay
/// in the language of the frontend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Error en el servidor: {0}")]
    TransportFailure(String),

    #[error("Error en el formato de la respuesta.")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Underlying detail, useful for logs where the display string is too terse.
    pub fn detail(&self) -> &str {
        match self {
            AnalysisError::InvalidInput(d)
            | AnalysisError::TransportFailure(d)
            | AnalysisError::MalformedResponse(d) => d,
        }
    }
}
