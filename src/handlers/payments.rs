use super::common::PaginationParams;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::reconciliation::ReconcileResult;
use crate::ApiResponse;
use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    /// Reference handed out at checkout
    #[validate(length(min = 1, message = "payment_reference is required"))]
    pub payment_reference: String,
}

/// Verify a payment after redirect return
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Reconciliation outcome", body = crate::ApiResponse<ReconcileResult>),
        (status = 404, description = "Unknown reference", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<ReconcileResult>>, ServiceError> {
    request.validate()?;
    let result = state
        .reconciliation_service()
        .reconcile(&request.payment_reference)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SimulatePaymentRequest {
    #[validate(length(min = 1, message = "payment_reference is required"))]
    pub payment_reference: String,
}

/// Re-run reconciliation for a reference (admin)
///
/// Converges on the same coordinator as verify and the webhook; useful
/// for references stuck pending after provider incidents.
#[utoipa::path(
    post,
    path = "/api/v1/payments/simulate",
    request_body = SimulatePaymentRequest,
    responses(
        (status = 200, description = "Reconciliation outcome", body = crate::ApiResponse<ReconcileResult>),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown reference", body = crate::errors::ErrorResponse)
    ),
    security(("admin_key" = [])),
    tag = "Payments"
)]
pub async fn simulate_payment(
    State(state): State<AppState>,
    Json(request): Json<SimulatePaymentRequest>,
) -> Result<Json<ApiResponse<ReconcileResult>>, ServiceError> {
    request.validate()?;
    let result = state
        .reconciliation_service()
        .reconcile(&request.payment_reference)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentListResponse {
    pub payments: Vec<crate::entities::payment::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// List settlement records (admin)
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    params(PaginationParams),
    responses(
        (status = 200, description = "Settlement records", body = crate::ApiResponse<PaymentListResponse>),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_key" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaymentListResponse>>, ServiceError> {
    let (page, per_page) = pagination.clamped();
    let (payments, total) = state.payment_service().list_payments(page, per_page).await?;
    Ok(Json(ApiResponse::success(PaymentListResponse {
        payments,
        total,
        page,
        per_page,
    })))
}

/// Public payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/verify", post(verify_payment))
}

/// Admin payment routes (wrapped with the admin-key layer by the caller)
pub fn payment_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/simulate", post(simulate_payment))
}
