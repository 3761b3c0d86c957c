//! HTTP 接口
//!
//! - `POST /upload`：multipart 字段 `pdf`，返回句柄和检测到的字段
//! - `POST /process-pdf`：`{filename, fields}`，返回生成的 PDF
//! - `GET /files/{filename}`：读取已上传的文件
//! - `GET /api/health`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use formforge_core::FieldDescriptor;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::commands::{self, CommandError};
use crate::config::AppConfig;
use crate::detect::CommandDetector;
use crate::store::{DocumentStore, StoreError};

pub const X_FIELDS_PLACED: HeaderName = HeaderName::from_static("x-fields-placed");
pub const X_FIELDS_SKIPPED: HeaderName = HeaderName::from_static("x-fields-skipped");
pub const X_FIELDS_DROPPED: HeaderName = HeaderName::from_static("x-fields-dropped");

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub detector: Option<Arc<CommandDetector>>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        Ok(Self {
            store: Arc::new(DocumentStore::open(&config.uploads_dir)?),
            detector: config
                .detector
                .as_ref()
                .map(|d| Arc::new(CommandDetector::new(d))),
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub fields: Vec<FieldDescriptor>,
}

/// 两个字段都可能缺失，缺失时返回 400 而不是反序列化错误；
/// `fields` 逐条解析，单条格式错误只跳过该条
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("[Server] {}: {}", self.status, self.message);
        } else {
            log::warn!("[Server] {}: {}", self.status, self.message);
        }
        let body = ErrorResponse {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        let status = match err {
            CommandError::MissingInput => StatusCode::BAD_REQUEST,
            CommandError::NotFound(_) => StatusCode::NOT_FOUND,
            CommandError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        CommandError::from(err).into()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

pub fn app(state: AppState) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route("/upload", post(upload))
        .route("/process-pdf", post(process_pdf))
        .route("/files/{filename}", get(get_file))
        .route("/api/health", get(health_check))
        .layer(DefaultBodyLimit::max(limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::new(e.status(), format!("Failed to read multipart field: {e}"))
    })? {
        if field.name() == Some("pdf") {
            let name = field.file_name().unwrap_or("upload.pdf").to_string();
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::new(e.status(), format!("Failed to read file data: {e}"))
            })?;
            upload = Some((name, bytes));
            break;
        }
    }

    let (name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let store = state.store.clone();
    let filename = tokio::task::spawn_blocking(move || store.save(&name, &bytes)).await??;

    let fields = match &state.detector {
        Some(detector) => detector.detect(&state.store.path(&filename)?).await,
        None => Vec::new(),
    };

    Ok(Json(UploadResponse { filename, fields }))
}

pub async fn process_pdf(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| {
        log::warn!("[Server] /process-pdf 请求体无法解析: {}", e.body_text());
        ApiError::from(CommandError::MissingInput)
    })?;
    log::info!(
        "[Server] /process-pdf {:?}, {} 个字段",
        request.filename,
        request.fields.as_ref().map_or(0, Vec::len)
    );

    let filename = request.filename.clone().unwrap_or_default();
    let store = state.store.clone();
    let materialized = tokio::task::spawn_blocking(move || {
        commands::materialize_entries(
            &store,
            request.filename.as_deref(),
            request.fields.as_deref(),
        )
    })
    .await??;

    let report = &materialized.report;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=edited_{}", filename),
            ),
            (X_FIELDS_PLACED, report.placed.len().to_string()),
            (X_FIELDS_SKIPPED, report.skipped.len().to_string()),
            (X_FIELDS_DROPPED, report.dropped.len().to_string()),
        ],
        materialized.bytes,
    )
        .into_response())
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let bytes = tokio::task::spawn_blocking(move || store.read(&filename)).await??;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "formforge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::test_support::blank_pdf;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "formforge-test-boundary";

    fn state(dir: &tempfile::TempDir) -> AppState {
        AppState::from_config(&AppConfig {
            uploads_dir: dir.path().join("uploads"),
            ..Default::default()
        })
        .unwrap()
    }

    fn multipart(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn process(payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process-pdf")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    async fn error_message(response: Response) -> String {
        let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        error.error
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state(&dir))
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(state(&dir));
        let pdf = blank_pdf(1);

        let response = app
            .clone()
            .oneshot(multipart("pdf", "form.pdf", &pdf))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded: UploadResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(uploaded.filename.starts_with("doc_"));
        assert!(uploaded.filename.ends_with("_form.pdf"));
        assert!(uploaded.fields.is_empty());

        let response = app
            .oneshot(
                Request::get(format!("/files/{}", uploaded.filename))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, pdf);
    }

    #[tokio::test]
    async fn test_upload_without_pdf_field() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state(&dir))
            .oneshot(multipart("document", "form.pdf", b"%PDF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "No file uploaded");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_runs_detector() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        state.detector = Some(Arc::new(CommandDetector::new(&DetectorConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "printf '%s' \"$0\"".to_string(),
                r#"[{"id":"py_0_1_1","type":"text","x":1,"y":1,"w":50,"h":12}]"#.to_string(),
            ],
        })));

        let response = app(state)
            .oneshot(multipart("pdf", "form.pdf", &blank_pdf(1)))
            .await
            .unwrap();
        let uploaded: UploadResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(uploaded.fields.len(), 1);
        assert_eq!(uploaded.fields[0].id, "py_0_1_1");
    }

    #[tokio::test]
    async fn test_process_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let handle = state.store.save("form.pdf", &blank_pdf(2)).unwrap();

        let response = app(state)
            .oneshot(process(json!({
                "filename": handle,
                "fields": [
                    { "id": "a", "type": "text", "page": 0, "x": 10, "y": 10, "w": 100, "h": 20, "name": "Name" },
                    { "id": "b", "type": "checkbox", "page": 1, "x": 10, "y": 40, "w": 15, "h": 15, "required": true },
                    { "id": "c", "type": "text", "page": 5, "x": 10, "y": 10, "w": 100, "h": 20 },
                    { "id": "d", "type": "text", "page": 0, "x": 10, "y": 10, "w": 0, "h": 20 }
                ]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            format!("attachment; filename=edited_{}", handle).as_str()
        );
        assert_eq!(headers[X_FIELDS_PLACED], "2");
        assert_eq!(headers[X_FIELDS_SKIPPED], "1");
        assert_eq!(headers[X_FIELDS_DROPPED], "1");

        let bytes = body_bytes(response).await;
        let result = formforge_verify::verify_bytes(&bytes).unwrap();
        let names: Vec<_> = result.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "b"]);
    }

    #[tokio::test]
    async fn test_process_malformed_descriptor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let handle = state.store.save("form.pdf", &blank_pdf(1)).unwrap();
        let app = app(state);
        let valid = json!({ "id": "ok", "type": "text", "page": 0, "x": 10, "y": 10, "w": 100, "h": 20, "name": "Kept" });

        for bad in [
            json!({ "id": "nan", "type": "text", "page": 0, "x": null, "y": 10, "w": 100, "h": 20 }),
            json!({ "id": "sig", "type": "signature", "page": 0, "x": 10, "y": 40, "w": 100, "h": 20 }),
        ] {
            let response = app
                .clone()
                .oneshot(process(json!({ "filename": handle, "fields": [valid.clone(), bad] })))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[X_FIELDS_PLACED], "1");
            assert_eq!(response.headers()[X_FIELDS_SKIPPED], "1");
            assert_eq!(response.headers()[X_FIELDS_DROPPED], "0");

            let bytes = body_bytes(response).await;
            let result = formforge_verify::verify_bytes(&bytes).unwrap();
            let names: Vec<_> = result.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["Kept"]);
        }
    }

    #[tokio::test]
    async fn test_process_unreadable_body_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(state(&dir));

        let not_json = Request::builder()
            .method("POST")
            .uri("/process-pdf")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ filename"))
            .unwrap();
        let response = app.clone().oneshot(not_json).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "Missing filename or fields");

        let response = app
            .oneshot(process(json!({ "filename": "doc_1_form.pdf", "fields": "all" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "Missing filename or fields");
    }

    #[tokio::test]
    async fn test_process_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state(&dir))
            .oneshot(process(json!({ "filename": "doc_1_form.pdf" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "Missing filename or fields");
    }

    #[tokio::test]
    async fn test_process_unknown_file() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state(&dir))
            .oneshot(process(json!({ "filename": "doc_1_gone.pdf", "fields": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_message(response).await, "File not found");
    }

    #[tokio::test]
    async fn test_process_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let handle = state.store.save("bad.pdf", b"garbage").unwrap();

        let response = app(state)
            .oneshot(process(json!({ "filename": handle, "fields": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_message(response).await.contains("failed to parse document"));
    }

    #[tokio::test]
    async fn test_file_traversal_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.pdf"), b"secret").unwrap();

        let response = app(state(&dir))
            .oneshot(
                Request::get("/files/..%2Fsecret.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        state.max_body_bytes = 1024;

        let response = app(state)
            .oneshot(multipart("pdf", "big.pdf", &vec![b'x'; 4096]))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
