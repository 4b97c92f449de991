use super::common::PaginationParams;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{OrderListResponse, OrderResponse, PaymentStatus};
use crate::ApiResponse;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

/// Get an order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order details", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .order_service()
        .get_order_with_items(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
    Ok(Json(ApiResponse::success(order)))
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders, newest first", body = crate::ApiResponse<OrderListResponse>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let (page, per_page) = pagination.clamped();
    let orders = state.order_service().list_orders(page, per_page).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Refund a paid order (admin)
///
/// Moves payment status `paid -> refunded`. The actual money movement
/// happens in the provider dashboard; this records the decision.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/refund",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order refunded", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Order is not paid", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("admin_key" = [])),
    tag = "Orders"
)]
pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .order_service()
        .transition_payment_status(order_id, PaymentStatus::Refunded, None)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Public order routes
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:order_id", get(get_order))
}

/// Admin order routes (wrapped with the admin-key layer by the caller)
pub fn order_admin_routes() -> Router<AppState> {
    Router::new().route("/:order_id/refund", post(refund_order))
}
