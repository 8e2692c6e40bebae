//! # HTTP API
//!
//! Tenant-scoped REST surface under `/api/v1` plus the fabric webhooks.
//! Every response uses the `{success, data}` / `{success: false, error,
//! message}` envelope; every tenant-scoped handler authorizes the bearer
//! token against the path tenant before touching the store. Cross-tenant
//! ids answer 404, never 403.

pub mod agents;
pub mod auth;
pub mod campaigns;
pub mod leads;
pub mod phone_numbers;
pub mod rate_limit;
pub mod tenants;
pub mod webhooks;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::error::EngineError;
use crate::inbound::InboundRouter;
use crate::orchestrator::CampaignSupervisor;

pub use auth::AuthVerifier;
pub use rate_limit::RateLimiter;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct ApiState {
    pub db: DatabaseManager,
    pub supervisor: Arc<CampaignSupervisor>,
    pub inbound: Arc<InboundRouter>,
    pub auth: Arc<AuthVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

/// Success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::CREATED, Json(json!({ "success": true, "data": data })))
}

/// Error envelope carrying the engine's machine code.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(EngineError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Authorization(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Precondition { .. } => StatusCode::BAD_REQUEST,
            EngineError::Telephony(_) => StatusCode::BAD_GATEWAY,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "success": false,
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Assemble the full application router.
pub fn build_router(state: ApiState) -> Router {
    let tenant_routes = Router::new()
        .route("/tenants", post(tenants::create_tenant))
        .route("/tenants/:tenant_id", get(tenants::get_tenant))
        .route("/tenants/:tenant_id/leads/stats", get(leads::lead_stats))
        .route(
            "/tenants/:tenant_id/campaigns",
            post(campaigns::create_campaign).get(campaigns::list_campaigns),
        )
        .route(
            "/tenants/:tenant_id/campaigns/:campaign_id",
            get(campaigns::get_campaign).put(campaigns::update_campaign),
        )
        .route("/tenants/:tenant_id/campaigns/:campaign_id/start", post(campaigns::start_campaign))
        .route("/tenants/:tenant_id/campaigns/:campaign_id/pause", post(campaigns::pause_campaign))
        .route(
            "/tenants/:tenant_id/campaigns/:campaign_id/resume",
            post(campaigns::resume_campaign),
        )
        .route("/tenants/:tenant_id/campaigns/:campaign_id/stop", post(campaigns::stop_campaign))
        .route("/tenants/:tenant_id/campaigns/:campaign_id/stats", get(campaigns::campaign_stats))
        .route(
            "/tenants/:tenant_id/campaigns/:campaign_id/agents",
            post(agents::assign_agent).get(agents::list_campaign_agents),
        )
        .route(
            "/tenants/:tenant_id/campaigns/:campaign_id/leads",
            get(leads::list_leads),
        )
        .route(
            "/tenants/:tenant_id/campaigns/:campaign_id/leads/bulk",
            post(leads::bulk_create_leads),
        )
        .route(
            "/tenants/:tenant_id/campaigns/:campaign_id/leads/upload",
            post(leads::upload_leads_csv),
        )
        .route(
            "/tenants/:tenant_id/phone-numbers",
            post(phone_numbers::create_phone_number).get(phone_numbers::list_phone_numbers),
        )
        .route("/agents", post(agents::create_agent).get(agents::list_agents));

    let webhook_routes = Router::new()
        .route("/webhooks/livekit/sip-inbound", post(webhooks::sip_inbound))
        .route("/webhooks/livekit/events", post(webhooks::room_events));

    let api = Router::new()
        .merge(tenant_routes)
        .merge(webhook_routes)
        .route("/health", get(health));

    let cors = match state.config.cors_origin.as_deref() {
        Some("*") | None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin([value])
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        },
    };

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    ok(json!({ "status": "up" }))
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| "global".to_string());

    if !state.rate_limiter.check(&key) {
        let body = Json(json!({
            "success": false,
            "error": "rate_limited",
            "message": "too many requests",
        }));
        return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    }
    next.run(request).await
}
