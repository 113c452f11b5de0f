//! Comprehensive API Router
//!
//! Combines all API endpoints from the specialized modules into a unified
//! router, together with the service health probe.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;

use crate::courses::configure_course_routes;
use crate::payments::configure_payment_routes;
use crate::profiles::configure_profile_routes;
use crate::progress::configure_progress_routes;
use crate::shared::state::AppState;

/// Configure all API routes from all modules
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // ===== Course Authoring & Catalog =====
        .merge(configure_course_routes())
        // ===== Learning Progress =====
        .merge(configure_progress_routes())
        // ===== Payments & Enrollment =====
        .merge(configure_payment_routes())
        // ===== Student & Instructor Profiles =====
        .merge(configure_profile_routes())
        // ===== Health & Monitoring =====
        .route("/health", get(health_check))
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state.conn.get().is_ok();

    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "courseserver",
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok
        })),
    )
}
