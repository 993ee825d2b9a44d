//! API Routes
//!
//! - `/api/datasets/upload` - Multipart dataset upload
//! - `/api/analysis/suggestions` - AI chart suggestions for a dataset
//! - `/api/charts/data` - Aggregated chart data
//! - `/api/health` - Health check

pub mod analysis;
pub mod charts;
pub mod datasets;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let api_router = Router::new()
        .merge(datasets::router(state.clone()))
        .merge(analysis::router(state.clone()))
        .merge(charts::router(state.clone()))
        .merge(health::router(state.clone()));

    apply_cors(api_router, &state.config.server.cors_allowed_origins).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::llm::ModelClient;
    use crate::storage::DatasetStore;

    const BOUNDARY: &str = "XBOUNDARYX";
    const SALES: &str = "Region,Sales\nNorth,100\nNorth,50\nSouth,30\n";

    async fn test_app(limit: u64) -> (TempDir, Router, DatasetStore) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.storage.root = temp_dir.path().to_path_buf();
        config.storage.max_upload_bytes = limit;

        let store = DatasetStore::open(&config.storage.root, limit).await.unwrap();
        let model_client = Arc::new(ModelClient::from_config(&config.llm));
        let state = AppState {
            config,
            store: store.clone(),
            model_client,
        };
        (temp_dir, create_router(state), store)
    }

    fn multipart_request(field: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
            b = BOUNDARY,
            field = field,
            filename = filename,
            content = content,
        );
        Request::builder()
            .method("POST")
            .uri("/api/datasets/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn upload_sales(app: &Router) -> String {
        let (status, body) = send(app, multipart_request("file", "sales.csv", SALES)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["filename"], "sales.csv");
        body["datasetId"].as_str().unwrap().to_string()
    }

    fn chart_body(dataset_id: &str, aggregation: &str) -> Value {
        json!({
            "datasetId": dataset_id,
            "chart_type": "bar",
            "x_axis": "Region",
            "y_axis": "Sales",
            "aggregation": aggregation
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (_tmp, app, _store) = test_app(1024).await;
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_client"], "not_configured");
    }

    #[tokio::test]
    async fn test_upload_then_chart_data() {
        let (_tmp, app, _store) = test_app(1024).await;
        let dataset_id = upload_sales(&app).await;

        let (status, body) = send(&app, json_request("/api/charts/data", chart_body(&dataset_id, "sum"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "series": [{
                    "label": "Sales",
                    "data": [{"x": "North", "y": 150.0}, {"x": "South", "y": 30.0}]
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let (_tmp, app, store) = test_app(1024).await;
        let (status, body) = send(&app, multipart_request("file", "notes.txt", "hello")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["detail"].as_str().unwrap().contains(".txt"));
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_requires_file_field() {
        let (_tmp, app, _store) = test_app(1024).await;
        let (status, body) = send(&app, multipart_request("document", "sales.csv", SALES)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_upload_leaves_nothing_behind() {
        let (_tmp, app, store) = test_app(16).await;
        let (status, body) = send(&app, multipart_request("file", "sales.csv", SALES)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["detail"].as_str().unwrap().contains("limit"));
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_chart_rejects_unknown_aggregation_before_lookup() {
        let (_tmp, app, _store) = test_app(1024).await;
        // The dataset does not exist, yet the allow-list check answers first.
        let missing = uuid::Uuid::new_v4().to_string();
        let (status, body) = send(&app, json_request("/api/charts/data", chart_body(&missing, "variance"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("variance"));
    }

    #[tokio::test]
    async fn test_chart_unknown_dataset_and_column() {
        let (_tmp, app, _store) = test_app(1024).await;
        let missing = uuid::Uuid::new_v4().to_string();
        let (status, _) = send(&app, json_request("/api/charts/data", chart_body(&missing, "sum"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let dataset_id = upload_sales(&app).await;
        let mut body = chart_body(&dataset_id, "sum");
        body["x_axis"] = json!("Country");
        let (status, _) = send(&app, json_request("/api/charts/data", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (_tmp, app, _store) = test_app(1024).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/analysis/suggestions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_suggestions_error_mapping() {
        let (_tmp, app, _store) = test_app(1024).await;
        let missing = uuid::Uuid::new_v4().to_string();
        let (status, _) = send(&app, json_request("/api/analysis/suggestions", json!({"datasetId": missing}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Without an API key the model client is unconfigured.
        let dataset_id = upload_sales(&app).await;
        let (status, body) = send(&app, json_request("/api/analysis/suggestions", json!({"datasetId": dataset_id}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["detail"].as_str().unwrap().contains("not configured"));
    }
}
