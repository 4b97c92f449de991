//! Outbound email: provider client and the queue dispatcher.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    services::email_queue::EmailQueueService,
};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends one email. Returns Ok only when the provider accepted it.
    async fn send(&self, recipient: &str, subject: &str, html: &str)
        -> Result<(), ServiceError>;
}

/// Resend HTTP client.
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from_email: String,
}

impl ResendMailer {
    pub fn new(
        base_url: String,
        api_key: String,
        from_email: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client build: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            from_email,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    #[instrument(skip(self, html), fields(recipient = %recipient, subject = %subject))]
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), ServiceError> {
        let resp = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from_email,
                "to": [recipient],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("email send: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "email provider {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Report from one dispatcher pass over the queue.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct DispatchReport {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Drains due queue rows through the mailer. One pass per invocation; the
/// task endpoint (or an external scheduler) decides cadence.
#[derive(Clone)]
pub struct EmailDispatcher {
    queue: EmailQueueService,
    mailer: Arc<dyn Mailer>,
    event_sender: Option<Arc<EventSender>>,
}

impl EmailDispatcher {
    pub fn new(
        queue: EmailQueueService,
        mailer: Arc<dyn Mailer>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            queue,
            mailer,
            event_sender,
        }
    }

    /// Claims up to `limit` due emails and attempts each one. A failed send
    /// only affects its own row; the pass continues with the rest.
    #[instrument(skip(self))]
    pub async fn dispatch_batch(&self, limit: u64) -> Result<DispatchReport, ServiceError> {
        let due = self.queue.claim_due(limit).await?;
        let mut report = DispatchReport {
            claimed: due.len(),
            ..Default::default()
        };

        for item in due {
            match self
                .mailer
                .send(&item.recipient, &item.subject, &item.html)
                .await
            {
                Ok(()) => {
                    // A duplicate claim means another worker may have
                    // delivered and removed this row already; that is
                    // still a delivery, and no marking failure is allowed
                    // to abort the rest of the pass
                    match self.queue.mark_sent(item.id).await {
                        Ok(()) => {}
                        Err(ServiceError::NotFound(_)) => {
                            info!(
                                queue_id = %item.id,
                                "Queue row already removed, delivered by a concurrent pass"
                            );
                        }
                        Err(e) => {
                            error!(
                                queue_id = %item.id,
                                error = %e,
                                "Failed to remove delivered email from queue"
                            );
                        }
                    }
                    report.sent += 1;
                    metrics::counter!("emails_sent_total", 1);
                    if let Some(sender) = &self.event_sender {
                        let _ = sender.send(Event::EmailSent { queue_id: item.id }).await;
                    }
                }
                Err(e) => {
                    error!(queue_id = %item.id, error = %e, "Email send failed");
                    report.failed += 1;
                    metrics::counter!("emails_failed_total", 1);
                    match self.queue.mark_failed(item.id, &e.to_string()).await {
                        Ok(updated) => {
                            if let Some(sender) = &self.event_sender {
                                let _ = sender
                                    .send(Event::EmailSendFailed {
                                        queue_id: item.id,
                                        attempts: updated.attempts,
                                    })
                                    .await;
                            }
                        }
                        Err(ServiceError::NotFound(_)) => {
                            info!(queue_id = %item.id, "Queue row removed mid-pass");
                        }
                        Err(mark_err) => {
                            error!(
                                queue_id = %item.id,
                                error = %mark_err,
                                "Failed to record email send failure"
                            );
                        }
                    }
                }
            }
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                sent = report.sent,
                failed = report.failed,
                "Email dispatch pass finished"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mailer_for(server: &MockServer) -> ResendMailer {
        ResendMailer::new(
            server.uri(),
            "re_test_key".to_string(),
            "orders@shop.example".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_posts_expected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(bearer_token("re_test_key"))
            .and(body_partial_json(serde_json::json!({
                "from": "orders@shop.example",
                "to": ["ada@example.com"],
                "subject": "Order confirmed",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "email_123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        mailer_for(&server)
            .send("ada@example.com", "Order confirmed", "<p>hi</p>")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn provider_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({ "message": "invalid from address" })),
            )
            .mount(&server)
            .await;

        let err = mailer_for(&server)
            .send("ada@example.com", "s", "<p>h</p>")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
        assert!(err.to_string().contains("invalid from address"));
    }

    #[tokio::test]
    async fn network_failure_is_an_error() {
        let mailer = ResendMailer::new(
            "http://127.0.0.1:9".to_string(),
            "re".to_string(),
            "orders@shop.example".to_string(),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(mailer.send("a@b.c", "s", "h").await.is_err());
    }
}
