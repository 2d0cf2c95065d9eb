use crate::analysis::AnalysisRequest;
use crate::data_url::decode_data_url;
use crate::error::AnalysisError;
use crate::llm_client::LlmClient;
use crate::models::{AnalyzeRequest, AnalyzeResponse, ErrorResponse};
use crate::request_id::inject_request_id;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

pub const MISSING_IMAGE: &str = "No se recibió la imagen";

#[derive(Debug, Clone)]
pub struct AppState {
    pub llm_client: Arc<LlmClient>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/analizar", post(analyze_image))
        .route("/health", get(|| async { "OK" }))
        .layer(axum::middleware::from_fn(inject_request_id))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let error_response = ErrorResponse { error: message.into() };
    (status, Json(error_response)).into_response()
}

#[axum_macros::debug_handler]
pub async fn analyze_image(
    State(app_state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    // Unreadable bodies get the same JSON error shape as every other failure
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text());
        }
    };

    let Some(imagen) = body.imagen else {
        info!("Request without 'imagen'");
        return error_response(StatusCode::BAD_REQUEST, MISSING_IMAGE);
    };

    let decoded = match decode_data_url(&imagen) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Failed to decode uploaded image: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    debug!("Decoded {} bytes of {}", decoded.bytes.len(), decoded.mime_type);

    let request = AnalysisRequest::new(decoded.bytes, decoded.mime_type)
        .with_patient(body.paciente.as_ref());

    // Upstream trouble is reported as the result text, like a model answer
    let resultado = match app_state.llm_client.analyze(&request).await {
        Ok(result) => result.text,
        Err(e @ (AnalysisError::TransportFailure(_) | AnalysisError::MalformedResponse(_))) => {
            warn!("Analysis failed: {} ({})", e, e.detail());
            e.to_string()
        }
        Err(e @ AnalysisError::InvalidInput(_)) => {
            warn!("Analysis rejected input: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    (StatusCode::OK, Json(AnalyzeResponse { resultado })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DEFAULT_PROMPT, NO_CANDIDATES_TEXT, PatientContext};
    use crate::config::GeminiParams;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use http_body_util::BodyExt;
    use mockito::Matcher;
    use serde_json::{Value, json};

    const PATH: &str = "/models/test-model:generateContent";
    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn state(api_base: String) -> AppState {
        let params = GeminiParams {
            api_base,
            model: "test-model".to_string(),
            api_key: "test-key".to_string(),
            timeout_secs: 5,
        };
        AppState {
            llm_client: Arc::new(LlmClient::new(Arc::new(reqwest::Client::new()), params)),
        }
    }

    fn png_data_url() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(PNG))
    }

    async fn call(app_state: AppState, body: AnalyzeRequest) -> (StatusCode, Value) {
        let resp = analyze_image(State(app_state), Ok(Json(body))).await;
        let status = resp.status();
        let body_bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body_bytes).unwrap())
    }

    async fn gemini_replying(server: &mut mockito::Server, body: Value) -> mockito::Mock {
        server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_missing_image_is_bad_request() {
        let body: AnalyzeRequest = serde_json::from_value(json!({ "otra": 1 })).unwrap();
        let (status, json_body) = call(state("http://127.0.0.1:9".to_string()), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body, json!({ "error": "No se recibió la imagen" }));
    }

    #[tokio::test]
    async fn test_malformed_base64_is_server_error() {
        let body = AnalyzeRequest {
            imagen: Some("data:image/png;base64,!!!esto no es base64!!!".to_string()),
            paciente: None,
        };
        let (status, json_body) = call(state("http://127.0.0.1:9".to_string()), body).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json_body["error"].as_str().unwrap();
        assert!(message.starts_with("base64 inválido"), "got: {}", message);
    }

    #[tokio::test]
    async fn test_missing_data_url_separator_is_server_error() {
        let body = AnalyzeRequest {
            imagen: Some(STANDARD.encode(PNG)),
            paciente: None,
        };
        let (status, json_body) = call(state("http://127.0.0.1:9".to_string()), body).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body["error"].is_string());
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": DEFAULT_PROMPT },
                        { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(PNG) } }
                    ]
                }]
            })))
            .with_status(200)
            .with_body(
                json!({ "candidates": [{ "content": { "parts": [{ "text": "Taquicardia sinusal." }] } }] })
                    .to_string(),
            )
            .create_async()
            .await;

        let body = AnalyzeRequest { imagen: Some(png_data_url()), paciente: None };
        let (status, json_body) = call(state(server.url()), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body, json!({ "resultado": "Taquicardia sinusal." }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_patient_context_reaches_prompt() {
        let patient = PatientContext {
            edad: Some("67".to_string()),
            genero: Some("femenino".to_string()),
            historial: None,
        };
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex("Edad: 67".to_string()))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#)
            .create_async()
            .await;

        let body = AnalyzeRequest { imagen: Some(png_data_url()), paciente: Some(patient) };
        let (status, _) = call(state(server.url()), body).await;

        assert_eq!(status, StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_candidates_is_still_a_result() {
        let mut server = mockito::Server::new_async().await;
        let _m = gemini_replying(&mut server, json!({ "usageMetadata": {} })).await;

        let body = AnalyzeRequest { imagen: Some(png_data_url()), paciente: None };
        let (status, json_body) = call(state(server.url()), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body["resultado"], NO_CANDIDATES_TEXT);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported_as_result() {
        let url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };

        let body = AnalyzeRequest { imagen: Some(png_data_url()), paciente: None };
        let (status, json_body) = call(state(url), body).await;

        assert_eq!(status, StatusCode::OK);
        assert!(json_body.get("error").is_none());
        assert!(json_body["resultado"].as_str().unwrap().starts_with("Error en el servidor:"));
    }

    #[tokio::test]
    async fn test_served_router_routes_and_tags_requests() {
        let mut server = mockito::Server::new_async().await;
        let _m = gemini_replying(
            &mut server,
            json!({ "candidates": [{ "content": { "parts": [{ "text": "Bloqueo AV de primer grado." }] } }] }),
        )
        .await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state(server.url()));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();

        let health = client.get(format!("http://{}/health", addr)).send().await.unwrap();
        assert_eq!(health.status(), 200);
        assert!(health.headers().contains_key("x-request-id"));
        assert_eq!(health.text().await.unwrap(), "OK");

        let resp = client
            .post(format!("http://{}/analizar", addr))
            .header("x-request-id", "abc-123")
            .json(&json!({ "imagen": png_data_url() }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-request-id"], "abc-123");
        let json_body: Value = resp.json().await.unwrap();
        assert_eq!(json_body["resultado"], "Bloqueo AV de primer grado.");

        let missing = client
            .post(format!("http://{}/analizar", addr))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 400);
    }

    async fn serve(app_state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(app_state)).await.unwrap();
        });
        format!("http://{}/analizar", addr)
    }

    async fn assert_json_server_error(resp: reqwest::Response) {
        assert_eq!(resp.status(), 500);
        let json_body: Value = resp.json().await.expect("error body should be JSON");
        assert!(!json_body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_bodies_get_json_server_errors() {
        let url = serve(state("http://127.0.0.1:9".to_string())).await;
        let client = reqwest::Client::new();

        let non_string_image = client.post(&url).json(&json!({ "imagen": 123 })).send().await.unwrap();
        assert_json_server_error(non_string_image).await;

        let not_json = client
            .post(&url)
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_json_server_error(not_json).await;

        let no_content_type = client
            .post(&url)
            .body(json!({ "imagen": png_data_url() }).to_string())
            .send()
            .await
            .unwrap();
        assert_json_server_error(no_content_type).await;
    }

    #[tokio::test]
    async fn test_malformed_upstream_reply_is_reported_as_result() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>mantenimiento</html>")
            .create_async()
            .await;

        let body = AnalyzeRequest { imagen: Some(png_data_url()), paciente: None };
        let (status, json_body) = call(state(server.url()), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body, json!({ "resultado": "Error en el formato de la respuesta." }));
    }
}
