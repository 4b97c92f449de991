//! Storefront API Library
//!
//! Checkout, order/payment reconciliation against a hosted gateway, and a
//! durable outbound email queue.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod mailer;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::{extract::State, middleware, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::mailer::{EmailDispatcher, Mailer};
use crate::services::{
    email_queue::EmailQueueService, leads::LeadService, orders::OrderService,
    payment_attempts::PaymentAttemptService, payments::PaymentService,
    reconciliation::ReconciliationService,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Option<Arc<EventSender>>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.db.clone(), self.event_sender.clone())
    }

    pub fn payment_attempt_service(&self) -> PaymentAttemptService {
        PaymentAttemptService::new(self.db.clone())
    }

    pub fn payment_service(&self) -> PaymentService {
        PaymentService::new(self.db.clone())
    }

    pub fn email_queue_service(&self) -> EmailQueueService {
        EmailQueueService::new(self.db.clone(), self.config.email.max_attempts)
    }

    pub fn email_dispatcher(&self) -> EmailDispatcher {
        EmailDispatcher::new(
            self.email_queue_service(),
            self.mailer.clone(),
            self.event_sender.clone(),
        )
    }

    /// Owner notification address; falls back to the sender address so a
    /// missing setting degrades to self-notification instead of a crash.
    pub fn owner_email(&self) -> String {
        self.config
            .email
            .owner_email
            .clone()
            .unwrap_or_else(|| self.config.email.from_email.clone())
    }

    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(
            self.db.clone(),
            self.order_service(),
            self.payment_attempt_service(),
            self.payment_service(),
            self.email_queue_service(),
            self.gateway.clone(),
            self.owner_email(),
            self.event_sender.clone(),
        )
    }

    pub fn lead_service(&self) -> LeadService {
        LeadService::new(
            self.db.clone(),
            self.email_queue_service(),
            self.owner_email(),
            self.event_sender.clone(),
        )
    }
}

// Common response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Builds the `/api/v1` router. Admin surfaces sit behind the admin-key
/// layer; webhooks stay open but verify their own signatures.
pub fn api_v1_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .nest("/tasks", handlers::email_worker::email_worker_routes())
        .nest("/orders", handlers::orders::order_admin_routes())
        .nest("/payments", handlers::payments::payment_admin_routes())
        .nest("/leads", handlers::leads::lead_admin_routes())
        .layer(middleware::from_fn_with_state(state, auth::require_admin));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest(
            "/payments",
            handlers::payments::payment_routes()
                .merge(handlers::payment_webhooks::payment_webhook_routes()),
        )
        .nest("/webhooks", handlers::email_webhooks::email_webhook_routes())
        .nest("/leads", handlers::leads::lead_routes())
        .merge(admin)
}

async fn api_status() -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "service": "storefront-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

/// Liveness + database reachability.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "database": db_status,
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_carries_data_and_timestamp() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        chrono::DateTime::parse_from_rfc3339(&response.timestamp).unwrap();
    }

    #[test]
    fn error_response_has_no_data() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
