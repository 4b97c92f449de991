//! Shared fixtures: in-memory database, scriptable gateway and mailer.
#![allow(dead_code)]

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use storefront_api::db::DbPool;
use storefront_api::errors::ServiceError;
use storefront_api::gateway::{
    InitializedTransaction, PaymentGateway, VerifyOutcome, VerifyStatus,
};
use storefront_api::mailer::Mailer;
use storefront_api::migrator::Migrator;
use storefront_api::services::orders::{CreateOrderRequest, OrderItemInput};

/// Fresh in-memory database with the full schema applied. One pooled
/// connection: each in-memory SQLite connection is its own database, so
/// concurrent tasks must share the single schema-bearing one.
pub async fn setup_db() -> Arc<DbPool> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("in-memory sqlite");
    Migrator::up(&db, None).await.expect("migrations");
    Arc::new(db)
}

/// Gateway double whose verify outcomes are scripted per reference.
/// Unscripted references verify as pending, mirroring a provider that has
/// not seen the transaction yet.
#[derive(Default)]
pub struct MockGateway {
    outcomes: Mutex<HashMap<String, VerifyOutcome>>,
    verify_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_success(&self, reference: &str, amount_minor: i64) {
        self.script(
            reference,
            VerifyOutcome {
                status: VerifyStatus::Success,
                amount_minor: Some(amount_minor),
                reason: None,
                raw: json!({ "data": { "status": "success", "amount": amount_minor } }),
            },
        );
    }

    pub fn script_failure(&self, reference: &str, reason: &str) {
        self.script(
            reference,
            VerifyOutcome {
                status: VerifyStatus::Failed,
                amount_minor: None,
                reason: Some(reason.to_string()),
                raw: json!({ "data": { "status": "failed", "gateway_response": reason } }),
            },
        );
    }

    pub fn script(&self, reference: &str, outcome: VerifyOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(reference.to_string(), outcome);
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize(
        &self,
        _email: &str,
        _amount_minor: i64,
        reference: &str,
        _metadata: Value,
    ) -> Result<InitializedTransaction, ServiceError> {
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.test/{}", reference),
            access_code: None,
            reference: reference.to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifyOutcome, ServiceError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or(VerifyOutcome {
                status: VerifyStatus::Pending,
                amount_minor: None,
                reason: None,
                raw: Value::Null,
            }))
    }
}

/// Mailer double: records every send, optionally failing for scripted
/// recipients.
#[derive(Default)]
pub struct MockMailer {
    pub sent: Mutex<Vec<(String, String)>>,
    failing_recipients: Mutex<Vec<String>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .push(recipient.to_string());
    }

    pub fn sent_to(&self, recipient: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .count()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        _html: &str,
    ) -> Result<(), ServiceError> {
        if self
            .failing_recipients
            .lock()
            .unwrap()
            .iter()
            .any(|r| r == recipient)
        {
            return Err(ServiceError::ExternalServiceError(
                "simulated provider rejection".to_string(),
            ));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string()));
        Ok(())
    }
}

/// A two-item order totalling 98_600 minor units.
pub fn sample_order_request() -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: "Ada Obi".to_string(),
        customer_email: "ada@example.com".to_string(),
        customer_phone: "+2348012345678".to_string(),
        items: vec![
            OrderItemInput {
                product_id: None,
                product_name: "Quantum Plate".to_string(),
                unit_price: 49_300,
                quantity: 1,
            },
            OrderItemInput {
                product_id: None,
                product_name: "Flux Bowl".to_string(),
                unit_price: 49_300,
                quantity: 1,
            },
        ],
        subtotal: 98_600,
        delivery_fee: 0,
        total: 98_600,
        currency: "NGN".to_string(),
        delivery_method: "delivery".to_string(),
        delivery_address: Some("12 Marina Rd, Lagos".to_string()),
        pickup_location: None,
        idempotency_key: None,
        metadata: None,
    }
}

pub const OWNER_EMAIL: &str = "owner@shop.example";
