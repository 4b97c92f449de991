use crate::entities::lead::Model as LeadModel;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::leads::CaptureLeadRequest;
use crate::ApiResponse;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};

/// Capture a storefront lead
#[utoipa::path(
    post,
    path = "/api/v1/leads",
    request_body = CaptureLeadRequest,
    responses(
        (status = 201, description = "Lead captured", body = crate::ApiResponse<LeadModel>),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Leads"
)]
pub async fn capture_lead(
    State(state): State<AppState>,
    Json(request): Json<CaptureLeadRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LeadModel>>), ServiceError> {
    let lead = state.lead_service().capture_lead(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(lead))))
}

/// List captured leads (admin)
#[utoipa::path(
    get,
    path = "/api/v1/leads",
    responses(
        (status = 200, description = "Captured leads", body = crate::ApiResponse<Vec<LeadModel>>),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_key" = [])),
    tag = "Leads"
)]
pub async fn list_leads(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LeadModel>>>, ServiceError> {
    let leads = state.lead_service().list_leads().await?;
    Ok(Json(ApiResponse::success(leads)))
}

/// Public lead routes
pub fn lead_routes() -> Router<AppState> {
    Router::new().route("/", post(capture_lead))
}

/// Admin lead routes (wrapped with the admin-key layer by the caller)
pub fn lead_admin_routes() -> Router<AppState> {
    Router::new().route("/", get(list_leads))
}
