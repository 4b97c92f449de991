use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::mailer::DispatchReport;
use crate::ApiResponse;
use axum::{
    extract::{Json, Query, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, Serialize, IntoParams)]
pub struct DispatchParams {
    /// Maximum emails to attempt this pass (defaults to email.batch_limit)
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchResponse {
    pub processed: usize,
    #[serde(flatten)]
    pub report: DispatchReport,
}

/// Run one email dispatch pass (admin/worker trigger)
///
/// Intended to be hit by a scheduler; safe to call concurrently since a
/// duplicate claim at worst re-sends an email.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/email-queue",
    params(DispatchParams),
    responses(
        (status = 200, description = "Dispatch pass report", body = crate::ApiResponse<DispatchResponse>),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_key" = [])),
    tag = "Email"
)]
pub async fn run_email_queue(
    State(state): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Result<Json<ApiResponse<DispatchResponse>>, ServiceError> {
    let limit = params
        .limit
        .unwrap_or(state.config.email.batch_limit)
        .clamp(1, 100);
    let report = state.email_dispatcher().dispatch_batch(limit).await?;
    Ok(Json(ApiResponse::success(DispatchResponse {
        processed: report.sent + report.failed,
        report,
    })))
}

/// Worker task routes (wrapped with the admin-key layer by the caller)
pub fn email_worker_routes() -> Router<AppState> {
    Router::new().route("/email-queue", post(run_email_queue))
}
