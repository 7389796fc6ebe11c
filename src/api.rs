//! HTTP surface for docdigest.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /summarize` – Summarize an uploaded PDF (multipart field `file`) or inline text (JSON
//!   body `{"text": "..."}`). Returns `{"summary": "..."}`; failures return `{"error": "..."}`
//!   with status 400 for invalid input and 500 for processing failures.
//! - `GET /metrics` – Observe summarization counters since startup.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::metrics::MetricsSnapshot;
use crate::processing::{ProcessingApi, ProcessingError};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

const NO_SELECTED_FILE: &str = "No selected file";
const NO_TEXT_PROVIDED: &str = "No text provided";
const NO_FILE_OR_TEXT: &str = "No file or text provided";

/// Build the HTTP router exposing the summarization API surface.
///
/// `body_limit` caps the accepted request body size in bytes.
pub fn create_router<S>(service: Arc<S>, body_limit: usize) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/summarize", post(summarize::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Validated input for a summarize request.
#[derive(Debug)]
enum SummarizeInput {
    Pdf(Vec<u8>),
    Text(String),
}

/// Success response for the `POST /summarize` endpoint.
#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

/// Summarize an uploaded PDF or inline text.
///
/// A multipart `file` part takes precedence; otherwise the JSON body's `text` field is used.
async fn summarize<S>(
    State(service): State<Arc<S>>,
    request: Request,
) -> Result<Json<SummaryResponse>, ApiError>
where
    S: ProcessingApi,
{
    let span = tracing::info_span!("summarize", request_id = %Uuid::new_v4());
    async move {
        let input = read_input(request).await?;
        let outcome = match input {
            SummarizeInput::Pdf(bytes) => service.summarize_pdf(bytes).await?,
            SummarizeInput::Text(text) => service.summarize_text(text).await?,
        };
        tracing::info!(
            chunks = outcome.chunk_count,
            failed_chunks = outcome.failed_chunks,
            "Summarize request completed"
        );
        Ok(Json(SummaryResponse {
            summary: outcome.summary,
        }))
    }
    .instrument(span)
    .await
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_input(request: Request) -> Result<SummarizeInput, ApiError> {
    if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rejection| ApiError::Rejection(rejection.status(), rejection.body_text()))?;
        read_multipart(multipart).await
    } else {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|rejection| ApiError::Rejection(rejection.status(), rejection.body_text()))?;
        text_from_json(&body)
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<SummarizeInput, ApiError> {
    let mut text = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let has_file_name = field
                    .file_name()
                    .map(|file_name| !file_name.is_empty())
                    .unwrap_or(false);
                if !has_file_name {
                    return Err(ApiError::Validation(NO_SELECTED_FILE));
                }
                let bytes = field.bytes().await?;
                return Ok(SummarizeInput::Pdf(bytes.to_vec()));
            }
            Some("text") => text = Some(field.text().await?),
            _ => {}
        }
    }

    match text {
        Some(text) if !text.is_empty() => Ok(SummarizeInput::Text(text)),
        Some(_) => Err(ApiError::Validation(NO_TEXT_PROVIDED)),
        None => Err(ApiError::Validation(NO_FILE_OR_TEXT)),
    }
}

/// Pull the `text` field out of a JSON body. Bodies that are not JSON objects carry no text.
fn text_from_json(body: &[u8]) -> Result<SummarizeInput, ApiError> {
    let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match payload.get("text") {
        None => Err(ApiError::Validation(NO_FILE_OR_TEXT)),
        Some(Value::String(text)) if !text.is_empty() => Ok(SummarizeInput::Text(text.clone())),
        Some(_) => Err(ApiError::Validation(NO_TEXT_PROVIDED)),
    }
}

/// Return summarization counters accumulated since startup.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Summarize a PDF uploaded as multipart field `file` (text layer plus OCR of embedded images) or inline JSON text. Response returns { \"summary\": string }.",
                request_example: Some(json!({
                    "text": "Long text to summarize"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return summarization counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

#[derive(Debug)]
enum ApiError {
    /// Missing or empty input.
    Validation(&'static str),
    /// The request body could not be read.
    Rejection(StatusCode, String),
    Processing(ProcessingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            Self::Rejection(status, message) => (status, message),
            Self::Processing(error) if error.is_client_error() => {
                (StatusCode::BAD_REQUEST, error.to_string())
            }
            Self::Processing(error) => {
                tracing::error!(error = %error, "Summarize request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ProcessingError> for ApiError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::Rejection(error.status(), error.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::extraction::ExtractionError;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{ProcessingApi, ProcessingError, SummaryOutcome};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docdigest-test-boundary";
    const BODY_LIMIT: usize = 1024 * 1024;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Pdf(Vec<u8>),
        Text(String),
    }

    struct StubProcessingService {
        calls: Mutex<Vec<Call>>,
        pdf_result: fn() -> Result<SummaryOutcome, ProcessingError>,
    }

    impl StubProcessingService {
        fn new() -> Self {
            Self::with_pdf_result(|| Ok(outcome("pdf summary ")))
        }

        fn with_pdf_result(pdf_result: fn() -> Result<SummaryOutcome, ProcessingError>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                pdf_result,
            }
        }

        async fn recorded_calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }
    }

    fn outcome(summary: &str) -> SummaryOutcome {
        SummaryOutcome {
            summary: summary.to_string(),
            chunk_count: 1,
            failed_chunks: 0,
        }
    }

    #[async_trait]
    impl ProcessingApi for StubProcessingService {
        async fn summarize_pdf(
            &self,
            pdf_bytes: Vec<u8>,
        ) -> Result<SummaryOutcome, ProcessingError> {
            self.calls.lock().await.push(Call::Pdf(pdf_bytes));
            (self.pdf_result)()
        }

        async fn summarize_text(&self, text: String) -> Result<SummaryOutcome, ProcessingError> {
            let summary = format!("summary of {} words ", text.split_whitespace().count());
            self.calls.lock().await.push(Call::Text(text));
            Ok(outcome(&summary))
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_summarized: 7,
                ..MetricsSnapshot::default()
            }
        }
    }

    fn app(service: Arc<StubProcessingService>) -> Router {
        create_router(service, BODY_LIMIT)
    }

    fn json_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/summarize")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/summarize")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn empty_json_object_is_rejected() {
        let service = Arc::new(StubProcessingService::new());
        let (status, body) = send(app(service.clone()), json_request("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "No file or text provided" }));
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn inline_text_is_summarized() {
        let service = Arc::new(StubProcessingService::new());
        let (status, body) = send(
            app(service.clone()),
            json_request(&json!({ "text": "hello world" }).to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "summary of 2 words ");
        assert_eq!(
            service.recorded_calls().await,
            vec![Call::Text("hello world".into())]
        );
    }

    #[tokio::test]
    async fn empty_or_null_text_is_rejected() {
        for payload in [json!({ "text": "" }), json!({ "text": null }), json!({ "text": 5 })] {
            let service = Arc::new(StubProcessingService::new());
            let (status, body) =
                send(app(service.clone()), json_request(&payload.to_string())).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
            assert_eq!(body, json!({ "error": "No text provided" }));
        }
    }

    #[tokio::test]
    async fn missing_body_counts_as_no_input() {
        let service = Arc::new(StubProcessingService::new());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/summarize")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file or text provided");
    }

    #[tokio::test]
    async fn uploaded_file_is_forwarded_to_pdf_pipeline() {
        let service = Arc::new(StubProcessingService::new());
        let request = multipart_request(&[("file", Some("report.pdf"), "%PDF-1.5 bytes")]);
        let (status, body) = send(app(service.clone()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "summary": "pdf summary " }));
        assert_eq!(
            service.recorded_calls().await,
            vec![Call::Pdf(b"%PDF-1.5 bytes".to_vec())]
        );
    }

    #[tokio::test]
    async fn empty_file_name_is_rejected() {
        let service = Arc::new(StubProcessingService::new());
        let request = multipart_request(&[("file", Some(""), "")]);
        let (status, body) = send(app(service.clone()), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "No selected file" }));
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn multipart_text_field_is_accepted_without_file() {
        let service = Arc::new(StubProcessingService::new());
        let request = multipart_request(&[("text", None, "one two three")]);
        let (status, body) = send(app(service.clone()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "summary of 3 words ");
    }

    #[tokio::test]
    async fn multipart_without_file_or_text_is_rejected() {
        let service = Arc::new(StubProcessingService::new());
        let request = multipart_request(&[("other", None, "value")]);
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file or text provided");
    }

    #[tokio::test]
    async fn pdf_without_text_maps_to_bad_request() {
        let service = Arc::new(StubProcessingService::with_pdf_result(|| {
            Err(ProcessingError::NoExtractableText)
        }));
        let request = multipart_request(&[("file", Some("scan.pdf"), "%PDF")]);
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": "No extractable text found in the PDF." })
        );
    }

    #[tokio::test]
    async fn processing_failure_maps_to_server_error() {
        let service = Arc::new(StubProcessingService::with_pdf_result(|| {
            Err(ProcessingError::Extraction(ExtractionError::Empty))
        }));
        let request = multipart_request(&[("file", Some("broken.pdf"), "")]);
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "Error in processing PDF: uploaded file is empty"
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let service = Arc::new(StubProcessingService::new());
        let text = "word ".repeat(64);
        let request = json_request(&json!({ "text": text }).to_string());
        let response = create_router(service, 32)
            .oneshot(request)
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn metrics_route_returns_snapshot() {
        let service = Arc::new(StubProcessingService::new());
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(app(service), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents_summarized"], 7);
        assert_eq!(body["chunk_failures"], 0);
    }

    #[tokio::test]
    async fn commands_catalog_exposes_summarize_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let summarize = commands
            .iter()
            .find(|cmd| cmd.name == "summarize")
            .expect("summarize command present");

        assert_eq!(summarize.method, "POST");
        assert_eq!(summarize.path, "/summarize");
        assert!(summarize.description.to_lowercase().contains("pdf"));
    }
}
