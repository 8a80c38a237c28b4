//! HTTP surface.
//!
//! Public routes run analyses and expose read-only status. Routes under
//! `/api/admin` require the shared secret in the `x-admin-key` header.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::signal;
use tracing::{error, info};

use crate::access::Denial;
use crate::admin::{Admin, AdminError, AdminGrant, ControlTarget, MonetizationUpdate};
use crate::category::{AnalysisRequest, ContentCategory, MediaKind, Plan};
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::normalize::AnalysisResult;
use crate::state::{normalize_identity, CategoryRequirement};
use crate::store::StoreError;

/// Header carrying the admin secret.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Shared admin secret; `None` locks every admin route
    pub admin_secret: Option<Arc<str>>,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, admin_secret: Option<String>) -> Self {
        Self {
            dispatcher,
            admin_secret: admin_secret.map(Arc::from),
            startup_time: Instant::now(),
        }
    }

    fn admin(&self, headers: &HeaderMap) -> Result<Admin<'_>, ApiError> {
        let presented = headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        let grant = AdminGrant::verify(self.admin_secret.as_deref(), presented)?;
        Ok(Admin::new(self.dispatcher.store(), grant))
    }
}

/// Errors returned by handlers, rendered as JSON.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Denied(Denial),
    #[error("{0}")]
    Internal(String),
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            DispatchError::Denied(denial) => ApiError::Denied(denial),
            DispatchError::Store(e) => e.into(),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Unauthorized | AdminError::NotConfigured => ApiError::Unauthorized,
            AdminError::InvalidInput(msg) => ApiError::BadRequest(msg),
            AdminError::UserNotFound(_) => ApiError::NotFound("user not found".to_string()),
            AdminError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Denied(Denial::CategoryOffline { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CATEGORY_OFFLINE")
            }
            ApiError::Denied(Denial::InsufficientTier { .. }) => {
                (StatusCode::FORBIDDEN, "UPGRADE_REQUIRED")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let mut body = json!({
            "message": self.to_string(),
            "code": code,
        });

        match &self {
            ApiError::Denied(denial) => {
                if let (Some(obj), Ok(Value::Object(extra))) =
                    (body.as_object_mut(), serde_json::to_value(denial))
                {
                    obj.extend(extra);
                    let category = match denial {
                        Denial::CategoryOffline { category } => category,
                        Denial::InsufficientTier { category, .. } => category,
                    };
                    obj.insert("engine".to_string(), json!(category.engine_name()));
                    obj.insert("detectedType".to_string(), json!(category));
                    if matches!(denial, Denial::InsufficientTier { .. }) {
                        obj.insert("upgradeRequired".to_string(), json!(true));
                    }
                }
            }
            ApiError::Internal(msg) => error!(error = %msg, "request failed"),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/control", post(admin_control))
        .route("/monetization", post(admin_monetization))
        .route(
            "/requirements",
            get(admin_requirements).post(admin_set_requirement),
        )
        .route("/audit-sync", post(admin_audit_sync))
        .route("/history", get(admin_history))
        .route("/upgrade-user", post(admin_upgrade_user))
        .route("/users", get(admin_users))
        .route("/users/:email", delete(admin_remove_user));

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/system-status", get(system_status))
        .route("/api/user-status/:email", get(user_status))
        .route("/api/monetization", get(monetization))
        .nest("/api/admin", admin)
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "truthgate",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "type")]
    category: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    status: &'static str,
    engine: &'static str,
    detected_type: ContentCategory,
    timestamp: DateTime<Utc>,
    result: AnalysisResult,
}

impl AnalyzeBody {
    fn into_request(self) -> Result<AnalysisRequest, ApiError> {
        let mut request = AnalysisRequest::new(self.content.unwrap_or_default());

        match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("auto") => {}
            Some(name) => {
                let category = ContentCategory::parse(name)
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown type: {}", name)))?;
                request = request.with_hint(category);
            }
        }

        if let Some(kind) = self.media_type.as_deref().filter(|k| !k.trim().is_empty()) {
            let kind: MediaKind = kind.parse().map_err(ApiError::BadRequest)?;
            request = request.with_media_kind(kind);
        }

        if let Some(email) = self.email.filter(|e| !e.trim().is_empty()) {
            request = request.with_caller(email);
        }

        Ok(request)
    }
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request = body.into_request()?;
    let result = state.dispatcher.analyze(&request).await?;
    Ok(Json(AnalyzeResponse {
        status: "ANALYSIS_COMPLETE",
        engine: result.category.engine_name(),
        detected_type: result.category,
        timestamp: Utc::now(),
        result,
    }))
}

async fn system_status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let flags = state
        .dispatcher
        .store()
        .read(|doc| doc.system_status.clone())?;
    Ok(Json(json!(flags)))
}

async fn user_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .dispatcher
        .store()
        .read(|doc| doc.access_record(Some(&email)))?;
    Ok(Json(json!(record)))
}

async fn monetization(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let settings = state
        .dispatcher
        .store()
        .read(|doc| doc.monetization_settings.clone())?;
    Ok(Json(json!(settings)))
}

#[derive(Debug, Deserialize)]
struct ControlBody {
    target: String,
}

async fn admin_control(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ControlBody>,
) -> Result<Json<Value>, ApiError> {
    let admin = state.admin(&headers)?;
    let target = ControlTarget::parse(&body.target)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown control target: {}", body.target)))?;
    let flags = admin.control(target)?;

    let mut response = json!({ "status": "Updated" });
    if let (Some(obj), Value::Object(flags)) = (response.as_object_mut(), json!(flags)) {
        obj.extend(flags);
    }
    Ok(Json(response))
}

async fn admin_monetization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<MonetizationUpdate>,
) -> Result<Json<Value>, ApiError> {
    let settings = state.admin(&headers)?.update_monetization(update)?;
    Ok(Json(json!({ "status": "Updated", "monetizationSettings": settings })))
}

async fn admin_requirements(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state.admin(&headers)?;
    let requirements = state
        .dispatcher
        .store()
        .read(|doc| doc.category_requirements.clone())?;
    Ok(Json(json!(requirements)))
}

#[derive(Debug, Deserialize)]
struct RequirementBody {
    category: String,
    level: u32,
    plan: String,
}

async fn admin_set_requirement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RequirementBody>,
) -> Result<Json<Value>, ApiError> {
    let admin = state.admin(&headers)?;
    let category = ContentCategory::parse(&body.category)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown category: {}", body.category)))?;
    let requirement = CategoryRequirement::new(body.level, Plan::parse_lenient(&body.plan));
    let requirements = admin.set_requirement(category, requirement)?;
    Ok(Json(json!({ "status": "Updated", "categoryRequirements": requirements })))
}

#[derive(Debug, Default, Deserialize)]
struct AuditSyncBody {
    #[serde(default)]
    enabled: Option<bool>,
}

async fn admin_audit_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<AuditSyncBody>>,
) -> Result<Json<Value>, ApiError> {
    let admin = state.admin(&headers)?;
    let enabled = body.and_then(|Json(b)| b.enabled);
    let now = admin.set_audit_sync(enabled)?;
    Ok(Json(json!({ "auditSyncEnabled": now })))
}

async fn admin_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let entries = state.admin(&headers)?.history()?;
    Ok(Json(json!(entries)))
}

#[derive(Debug, Deserialize)]
struct UpgradeBody {
    email: String,
    plan: String,
}

async fn admin_upgrade_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpgradeBody>,
) -> Result<Json<Value>, ApiError> {
    let record = state.admin(&headers)?.upgrade_user(&body.email, &body.plan)?;
    Ok(Json(json!({
        "message": "User upgraded successfully.",
        "email": normalize_identity(&body.email),
        "user": record,
    })))
}

async fn admin_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let users = state.admin(&headers)?.list_users()?;
    Ok(Json(json!(users)))
}

async fn admin_remove_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.admin(&headers)?.remove_user(&email)?;
    Ok(Json(json!({ "message": "User removed successfully." })))
}
