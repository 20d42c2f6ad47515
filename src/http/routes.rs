//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::store::inventory::{export_csv, export_file_name, InventoryEntry, UpsertOutcome};
use crate::store::StoreError;
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/branches", get(branches_handler))
        .route(
            "/branches/:branch/inventory",
            get(inventory_handler).post(upsert_handler),
        )
        .route(
            "/branches/:branch/inventory/:barcode",
            get(lookup_handler).delete(delete_handler),
        )
        .route("/branches/:branch/export", get(export_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    branches: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        branches: state.store.branches().len(),
    })
}

// ============================================================================
// Branch selection
// ============================================================================

#[derive(Serialize)]
struct BranchesResponse {
    branches: Vec<String>,
}

/// The predefined branch set a client picks from before any table operation
async fn branches_handler(State(state): State<AppState>) -> Json<BranchesResponse> {
    Json(BranchesResponse {
        branches: state.store.branches().to_vec(),
    })
}

// ============================================================================
// Inventory endpoints
// ============================================================================

#[derive(Serialize)]
struct InventoryResponse {
    branch: String,
    entries: Vec<InventoryEntry>,
}

async fn inventory_handler(
    State(state): State<AppState>,
    Path(branch): Path<String>,
) -> Result<Json<InventoryResponse>, AppError> {
    let table = state.store.load(&branch)?;

    Ok(Json(InventoryResponse {
        branch,
        entries: table.entries,
    }))
}

#[derive(Deserialize)]
struct UpsertRequest {
    barcode: String,
    quantity: i64,
}

#[derive(Serialize)]
struct UpsertResponse {
    status: &'static str,
    message: String,
    entries: Vec<InventoryEntry>,
}

async fn upsert_handler(
    State(state): State<AppState>,
    Path(branch): Path<String>,
    Json(req): Json<UpsertRequest>,
) -> Result<Json<UpsertResponse>, AppError> {
    let (outcome, table) = state.store.upsert(&branch, &req.barcode, req.quantity)?;

    let barcode = req.barcode.trim();
    let (status, message) = match outcome {
        UpsertOutcome::Created => (
            "created",
            format!("Added barcode {} with quantity {}", barcode, req.quantity),
        ),
        UpsertOutcome::Updated => (
            "updated",
            format!("New quantity for {}: {}", barcode, req.quantity),
        ),
    };

    Ok(Json(UpsertResponse {
        status,
        message,
        entries: table.entries,
    }))
}

#[derive(Serialize)]
struct LookupResponse {
    barcode: String,
    quantity: u64,
}

/// Existence check for the client's confirm-overwrite step. 404 means the
/// barcode is free to add without confirmation.
async fn lookup_handler(
    State(state): State<AppState>,
    Path((branch, barcode)): Path<(String, String)>,
) -> Result<Json<LookupResponse>, AppError> {
    let quantity = state
        .store
        .lookup(&branch, &barcode)?
        .ok_or_else(|| AppError::NotFound(format!("Barcode not found: {}", barcode.trim())))?;

    Ok(Json(LookupResponse {
        barcode: barcode.trim().to_string(),
        quantity,
    }))
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
    entries: Vec<InventoryEntry>,
}

async fn delete_handler(
    State(state): State<AppState>,
    Path((branch, barcode)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, AppError> {
    let table = state.store.delete(&branch, &barcode)?;

    Ok(Json(DeleteResponse {
        message: format!("Deleted barcode {}", barcode.trim()),
        entries: table.entries,
    }))
}

// ============================================================================
// Export endpoint
// ============================================================================

async fn export_handler(
    State(state): State<AppState>,
    Path(branch): Path<String>,
) -> Result<Response, AppError> {
    let table = state.store.load(&branch)?;
    let csv = export_csv(&table);

    // Branch names may be non-ASCII, so the header is built from raw bytes
    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", export_file_name(&branch)).as_bytes(),
    )
    .map_err(|_| AppError::Internal("export file name is not a valid header value".to_string()))?;

    let mut response = (StatusCode::OK, csv).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(_) => AppError::BadRequest(err.to_string()),
            StoreError::NotFound(_) | StoreError::UnknownBranch(_) => {
                AppError::NotFound(err.to_string())
            }
            StoreError::Storage(_) | StoreError::Corrupt { .. } => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::Config;

    // "Coyoacán" percent-encoded for use in request URIs
    const BRANCH_PATH: &str = "Coyoac%C3%A1n";

    fn test_router(dir: &TempDir) -> Router {
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            data_dir: dir.path().to_path_buf(),
            branches: vec!["Coyoacán".to_string()],
            client_origin: "http://localhost:3000".to_string(),
        };
        let state = AppState::new(config);
        state.store.initialize().unwrap();
        build_router(state)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(router, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn upsert_request(barcode: &str, quantity: i64) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/branches/{}/inventory", BRANCH_PATH))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "barcode": barcode, "quantity": quantity }).to_string(),
            ))
            .unwrap()
    }

    fn get_request(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        let (status, body) = send_json(&router, get_request("/health".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["branches"], 1);
    }

    #[tokio::test]
    async fn branches_lists_configured_set() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        let (status, body) = send_json(&router, get_request("/branches".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["branches"], serde_json::json!(["Coyoacán"]));
    }

    #[tokio::test]
    async fn upsert_reports_created_then_updated() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        let (status, body) = send_json(&router, upsert_request(" 123 ", 5)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "created");
        assert_eq!(body["entries"][0]["barcode"], "123");
        assert_eq!(body["entries"][0]["quantity"], 5);

        let (status, body) = send_json(&router, upsert_request("123", 9)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "updated");
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["quantity"], 9);
    }

    #[tokio::test]
    async fn invalid_quantity_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        let (status, body) = send_json(&router, upsert_request("123", 0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("quantity"));
    }

    #[tokio::test]
    async fn lookup_hit_and_miss() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        send_json(&router, upsert_request("123", 7)).await;

        let uri = format!("/branches/{}/inventory/123", BRANCH_PATH);
        let (status, body) = send_json(&router, get_request(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quantity"], 7);

        let uri = format!("/branches/{}/inventory/999", BRANCH_PATH);
        let (status, _) = send_json(&router, get_request(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        send_json(&router, upsert_request("A", 1)).await;

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/branches/{}/inventory/Z", BRANCH_PATH))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send_json(&router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Table unchanged
        let uri = format!("/branches/{}/inventory", BRANCH_PATH);
        let (_, body) = send_json(&router, get_request(uri)).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        send_json(&router, upsert_request("A", 1)).await;
        send_json(&router, upsert_request("B", 2)).await;

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/branches/{}/inventory/A", BRANCH_PATH))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send_json(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["barcode"], "B");
    }

    #[tokio::test]
    async fn unknown_branch_is_not_found() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        let (status, _) =
            send_json(&router, get_request("/branches/Polanco/inventory".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_is_a_csv_download() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir);

        send_json(&router, upsert_request("00123", 5)).await;
        send_json(&router, upsert_request("456", 2)).await;

        let request = get_request(format!("/branches/{}/export", BRANCH_PATH));
        let response = router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .unwrap()
                .as_bytes(),
            "attachment; filename=\"Coyoacán_inventory.csv\"".as_bytes()
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Barcode,Quantity\n00123,5\n456,2\n");
    }
}
