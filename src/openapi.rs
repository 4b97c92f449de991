use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                crate::auth::ADMIN_KEY_HEADER,
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Checkout, order/payment reconciliation, and transactional email for a
small storefront.

## Flow

1. `POST /api/v1/checkout` creates an order and a pending payment attempt,
   returning a payment reference and either a hosted-checkout URL or
   inline-checkout config.
2. The customer pays at the gateway. The redirect return, the gateway
   webhook, and the admin retry all converge on the same reconciliation
   flow keyed by the reference; repeats are safe.
3. Confirmation emails ride a durable queue drained by
   `POST /api/v1/tasks/email-queue` with quadratic retry backoff.

## Authentication

Admin endpoints require the shared key in the `x-admin-key` header.
Webhook endpoints verify an HMAC-SHA256 signature over the raw body.

## Amounts

All monetary amounts are integers in minor currency units (e.g. kobo,
cents).
"#
    ),
    tags(
        (name = "Checkout", description = "Order creation and payment initiation"),
        (name = "Orders", description = "Order lookup and admin actions"),
        (name = "Payments", description = "Verification, webhooks, settlement records"),
        (name = "Email", description = "Outbound queue worker and delivery events"),
        (name = "Leads", description = "Lead capture")
    ),
    paths(
        crate::handlers::checkout::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::refund_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payments::simulate_payment,
        crate::handlers::payments::list_payments,
        crate::handlers::payment_webhooks::gateway_webhook,
        crate::handlers::email_worker::run_email_queue,
        crate::handlers::email_webhooks::email_delivery_webhook,
        crate::handlers::leads::capture_lead,
        crate::handlers::leads::list_leads,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,

            crate::handlers::checkout::CheckoutResponse,
            crate::handlers::checkout::InlineCheckoutConfig,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::OrderItemInput,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::PaymentStatus,

            crate::handlers::payments::VerifyPaymentRequest,
            crate::handlers::payments::SimulatePaymentRequest,
            crate::handlers::payments::PaymentListResponse,
            crate::services::reconciliation::ReconcileStatus,
            crate::services::reconciliation::ReconcileResult,
            crate::entities::payment::Model,

            crate::handlers::email_worker::DispatchResponse,
            crate::mailer::DispatchReport,

            crate::services::leads::CaptureLeadRequest,
            crate::entities::lead::Model,

            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/payments/verify"));
        assert!(json.contains("admin_key"));
    }
}
