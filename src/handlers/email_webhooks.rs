use crate::entities::email_delivery::ActiveModel as DeliveryActiveModel;
use crate::errors::ServiceError;
use crate::handlers::payment_webhooks::verify_webhook_signature;
use crate::handlers::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

pub const EMAIL_SIGNATURE_HEADER: &str = "x-resend-signature";

/// Email provider delivery-events webhook
///
/// Appends each verified event (sent, delivered, bounced, complained) to
/// the `email_deliveries` audit log. Events are never used to mutate the
/// outbound queue; the dispatcher's own send result drives that.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/email",
    request_body = Value,
    responses(
        (status = 200, description = "Event recorded"),
        (status = 401, description = "Signature rejected", body = crate::errors::ErrorResponse)
    ),
    tag = "Email"
)]
#[instrument(skip(state, headers, body))]
pub async fn email_delivery_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let signature = headers
        .get(EMAIL_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    verify_webhook_signature(
        state.config.email.webhook_secret.as_deref(),
        signature,
        &body,
    )?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid webhook body: {}", e)))?;

    let event_type = payload
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");
    // "email.delivered" -> "delivered"
    let status = event_type.strip_prefix("email.").unwrap_or(event_type);

    let recipient = payload
        .pointer("/data/to/0")
        .and_then(|r| r.as_str())
        .unwrap_or("unknown")
        .to_string();
    let subject = payload
        .pointer("/data/subject")
        .and_then(|s| s.as_str())
        .unwrap_or("")
        .to_string();

    let delivery = DeliveryActiveModel {
        id: Set(Uuid::new_v4()),
        recipient: Set(recipient.clone()),
        subject: Set(subject),
        status: Set(status.to_string()),
        provider: Set("resend".to_string()),
        payload: Set(payload),
        sent_at: Set(Utc::now()),
    };
    let inserted = delivery.insert(&*state.db).await?;

    info!(
        delivery_id = %inserted.id,
        recipient = %recipient,
        status = %inserted.status,
        "Email delivery event recorded"
    );
    Ok(Json(json!({ "received": true })))
}

/// Email delivery webhook routes
pub fn email_webhook_routes() -> Router<AppState> {
    Router::new().route("/email", post(email_delivery_webhook))
}
