use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{CreateOrderRequest, OrderResponse};
use crate::ApiResponse;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use validator::Validate;

/// Inline-checkout parameters for clients that embed the provider's
/// payment widget instead of following a hosted redirect.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InlineCheckoutConfig {
    /// Provider public key
    pub public_key: Option<String>,
    /// Charge amount in minor currency units
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub reference: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: OrderResponse,
    /// Payment reference correlating attempt, gateway transaction, and settlement
    pub reference: String,
    /// Hosted-checkout redirect URL, when the gateway is configured
    pub authorization_url: Option<String>,
    pub inline: InlineCheckoutConfig,
}

/// Create an order and start a payment attempt
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created with a pending payment attempt", body = crate::ApiResponse<CheckoutResponse>),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    request.validate()?;

    let order = state.order_service().create_order(request).await?;
    let attempt = state
        .payment_attempt_service()
        .record_attempt(order.id, order.total, &order.currency, "paystack")
        .await?;

    // Hosted checkout when the gateway is configured; a provider hiccup
    // degrades to inline config rather than losing the created order
    let authorization_url = if state.config.gateway.secret_key.is_some() {
        match state
            .gateway
            .initialize(
                &order.customer_email,
                attempt.amount,
                &attempt.reference,
                serde_json::json!({
                    "order_id": order.id,
                    "order_number": order.order_number,
                }),
            )
            .await
        {
            Ok(init) => Some(init.authorization_url),
            Err(e) => {
                warn!(error = %e, reference = %attempt.reference, "Gateway initialize failed, falling back to inline checkout");
                None
            }
        }
    } else {
        None
    };

    let inline = InlineCheckoutConfig {
        public_key: state.config.gateway.public_key.clone(),
        amount: attempt.amount,
        currency: attempt.currency.clone(),
        email: order.customer_email.clone(),
        reference: attempt.reference.clone(),
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CheckoutResponse {
            order,
            reference: attempt.reference,
            authorization_url,
            inline,
        })),
    ))
}

/// Checkout routes
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}
