//! Payment gateway client.
//!
//! The provider contract is "initialize a hosted transaction, verify it
//! later by reference". Provider-specific response shapes are normalized
//! here into [`VerifyOutcome`]; nothing downstream branches on raw
//! provider field names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::errors::ServiceError;

/// Tri-state verification result. Transient verifier trouble (timeouts,
/// non-2xx, malformed body) is always `Pending`, never `Failed`: a flaky
/// network must not mark a real payment as declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Success,
    Failed,
    Pending,
}

/// Normalized verification outcome for one payment reference.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub status: VerifyStatus,
    /// Amount the provider says was paid, in minor currency units
    pub amount_minor: Option<i64>,
    /// Failure reason reported by the provider, if any
    pub reason: Option<String>,
    /// Raw provider payload, persisted opaquely on the attempt
    pub raw: Value,
}

/// Hosted-checkout initialization result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub reference: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Initializes a hosted transaction and returns the redirect URL.
    async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
        metadata: Value,
    ) -> Result<InitializedTransaction, ServiceError>;

    /// Verifies the transaction with the given reference.
    async fn verify(&self, reference: &str) -> Result<VerifyOutcome, ServiceError>;
}

/// Paystack HTTP client.
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    callback_url: Option<String>,
}

impl PaystackGateway {
    pub fn new(
        base_url: String,
        secret_key: String,
        callback_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client build: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            secret_key,
            callback_url,
        })
    }
}

/// Maps a provider transaction status string to the tri-state result.
/// Unknown strings stay `Pending` so a provider vocabulary change can only
/// delay reconciliation, never flip its direction.
pub fn normalize_provider_status(raw: &str) -> VerifyStatus {
    match raw.to_ascii_lowercase().as_str() {
        "success" | "paid" => VerifyStatus::Success,
        "failed" | "abandoned" | "reversed" => VerifyStatus::Failed,
        _ => VerifyStatus::Pending,
    }
}

/// Extracts the normalized outcome from a provider verify body.
fn outcome_from_body(body: Value) -> VerifyOutcome {
    let data = body.get("data").cloned().unwrap_or(Value::Null);
    let status = data
        .get("status")
        .and_then(|s| s.as_str())
        .map(normalize_provider_status)
        .unwrap_or(VerifyStatus::Pending);
    let amount_minor = data.get("amount").and_then(|a| a.as_i64());
    let reason = data
        .get("gateway_response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string());
    VerifyOutcome {
        status,
        amount_minor,
        reason,
        raw: body,
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    #[instrument(skip(self, metadata), fields(reference = %reference))]
    async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
        metadata: Value,
    ) -> Result<InitializedTransaction, ServiceError> {
        let mut payload = serde_json::json!({
            "email": email,
            "amount": amount_minor,
            "reference": reference,
            "metadata": metadata,
        });
        if let Some(url) = &self.callback_url {
            payload["callback_url"] = Value::String(url.clone());
        }

        let resp = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("gateway initialize: {}", e)))?;

        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("gateway initialize body: {}", e))
        })?;

        if !status.is_success() {
            let msg = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("gateway error");
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway initialize {}: {}",
                status, msg
            )));
        }

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let authorization_url = data
            .get("authorization_url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(
                    "gateway initialize response missing authorization_url".to_string(),
                )
            })?
            .to_string();

        Ok(InitializedTransaction {
            authorization_url,
            access_code: data
                .get("access_code")
                .and_then(|c| c.as_str())
                .map(String::from),
            reference: data
                .get("reference")
                .and_then(|r| r.as_str())
                .unwrap_or(reference)
                .to_string(),
        })
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn verify(&self, reference: &str) -> Result<VerifyOutcome, ServiceError> {
        let resp = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                // Network failure is inconclusive, not a decline
                warn!(error = %e, "gateway verify request failed; treating as pending");
                return Ok(VerifyOutcome {
                    status: VerifyStatus::Pending,
                    amount_minor: None,
                    reason: None,
                    raw: Value::Null,
                });
            }
        };

        if !resp.status().is_success() {
            let code = resp.status();
            warn!(status = %code, "gateway verify returned non-2xx; treating as pending");
            return Ok(VerifyOutcome {
                status: VerifyStatus::Pending,
                amount_minor: None,
                reason: None,
                raw: Value::Null,
            });
        }

        match resp.json::<Value>().await {
            Ok(body) => Ok(outcome_from_body(body)),
            Err(e) => {
                warn!(error = %e, "gateway verify body unreadable; treating as pending");
                Ok(VerifyOutcome {
                    status: VerifyStatus::Pending,
                    amount_minor: None,
                    reason: None,
                    raw: Value::Null,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> PaystackGateway {
        PaystackGateway::new(
            server.uri(),
            "sk_test_secret".to_string(),
            None,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn provider_status_normalization() {
        assert_eq!(normalize_provider_status("success"), VerifyStatus::Success);
        assert_eq!(normalize_provider_status("PAID"), VerifyStatus::Success);
        assert_eq!(normalize_provider_status("failed"), VerifyStatus::Failed);
        assert_eq!(normalize_provider_status("abandoned"), VerifyStatus::Failed);
        assert_eq!(normalize_provider_status("reversed"), VerifyStatus::Failed);
        assert_eq!(normalize_provider_status("ongoing"), VerifyStatus::Pending);
        assert_eq!(normalize_provider_status(""), VerifyStatus::Pending);
    }

    #[tokio::test]
    async fn verify_success_extracts_amount_and_raw() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transaction/verify/ref_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "data": { "status": "success", "amount": 98600, "currency": "NGN" }
            })))
            .mount(&server)
            .await;

        let outcome = gateway_for(&server).verify("ref_1").await.unwrap();
        assert_eq!(outcome.status, VerifyStatus::Success);
        assert_eq!(outcome.amount_minor, Some(98600));
        assert!(outcome.raw.get("data").is_some());
    }

    #[tokio::test]
    async fn verify_failed_carries_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transaction/verify/ref_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "data": { "status": "failed", "amount": 5000, "gateway_response": "Declined" }
            })))
            .mount(&server)
            .await;

        let outcome = gateway_for(&server).verify("ref_2").await.unwrap();
        assert_eq!(outcome.status, VerifyStatus::Failed);
        assert_eq!(outcome.reason.as_deref(), Some("Declined"));
    }

    #[tokio::test]
    async fn verify_server_error_is_pending_not_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transaction/verify/ref_3"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = gateway_for(&server).verify("ref_3").await.unwrap();
        assert_eq!(outcome.status, VerifyStatus::Pending);
    }

    #[tokio::test]
    async fn verify_unreachable_host_is_pending() {
        // Port 9 (discard) refuses connections quickly
        let gw = PaystackGateway::new(
            "http://127.0.0.1:9".to_string(),
            "sk".to_string(),
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        let outcome = gw.verify("ref_x").await.unwrap();
        assert_eq!(outcome.status, VerifyStatus::Pending);
    }

    #[tokio::test]
    async fn initialize_returns_authorization_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "data": {
                    "authorization_url": "https://checkout.example/abc",
                    "access_code": "abc",
                    "reference": "ref_4"
                }
            })))
            .mount(&server)
            .await;

        let init = gateway_for(&server)
            .initialize("c@example.com", 98600, "ref_4", json!({}))
            .await
            .unwrap();
        assert_eq!(init.authorization_url, "https://checkout.example/abc");
        assert_eq!(init.reference, "ref_4");
    }

    #[tokio::test]
    async fn initialize_error_surfaces_as_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "status": false, "message": "Invalid key" })),
            )
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .initialize("c@example.com", 100, "ref_5", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }
}
