use crate::{
    db::DbPool,
    entities::order::Entity as OrderEntity,
    entities::payment_attempt::Model as AttemptModel,
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{PaymentGateway, VerifyOutcome, VerifyStatus},
    notifications,
    services::{
        email_queue::EmailQueueService,
        orders::{OrderService, PaymentStatus},
        payment_attempts::{AttemptOutcome, CompletionDetails, PaymentAttemptService},
        payments::{EnsurePaymentInput, PaymentService},
    },
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Outcome of a reconciliation pass for one reference, as reported to the
/// caller (redirect page, provider webhook, admin retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// Payment verified and the order is paid
    Success,
    /// Payment declined or abandoned
    Failed,
    /// Verification was inconclusive; try again later
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconcileResult {
    pub status: ReconcileStatus,
    pub reference: String,
    pub order_number: Option<String>,
    pub failure_reason: Option<String>,
}

/// Coordinator for the verify-and-settle flow.
///
/// Every signal that a payment may have completed (customer redirect,
/// provider webhook, admin retry) funnels into [`Self::reconcile`]. The
/// flow is convergent: any number of repeated or overlapping calls for the
/// same reference produce one terminal attempt, at most one order
/// transition to paid, at most one settlement row, and exactly one pair of
/// notification emails.
#[derive(Clone)]
pub struct ReconciliationService {
    db_pool: Arc<DbPool>,
    orders: OrderService,
    attempts: PaymentAttemptService,
    payments: PaymentService,
    email_queue: EmailQueueService,
    gateway: Arc<dyn PaymentGateway>,
    owner_email: String,
    event_sender: Option<Arc<EventSender>>,
}

impl ReconciliationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: Arc<DbPool>,
        orders: OrderService,
        attempts: PaymentAttemptService,
        payments: PaymentService,
        email_queue: EmailQueueService,
        gateway: Arc<dyn PaymentGateway>,
        owner_email: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            orders,
            attempts,
            payments,
            email_queue,
            gateway,
            owner_email,
            event_sender,
        }
    }

    /// Reconciles one payment reference against the gateway.
    ///
    /// Already-terminal attempts replay the recorded outcome without
    /// re-verifying; a replay still repairs the order and settlement row if
    /// an earlier pass crashed between steps, but never re-sends emails.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn reconcile(&self, reference: &str) -> Result<ReconcileResult, ServiceError> {
        let attempt = self
            .attempts
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("no payment attempt for reference {}", reference))
            })?;

        if attempt.is_terminal() {
            return self.replay_terminal(attempt).await;
        }

        let outcome = self.gateway.verify(reference).await?;
        match outcome.status {
            VerifyStatus::Success => self.settle_success(attempt, outcome).await,
            VerifyStatus::Failed => self.settle_failure(attempt, outcome).await,
            VerifyStatus::Pending => {
                info!(reference = %reference, "Verification inconclusive, no state written");
                metrics::counter!("reconciliation_pending_total", 1);
                Ok(ReconcileResult {
                    status: ReconcileStatus::Pending,
                    reference: reference.to_string(),
                    order_number: None,
                    failure_reason: None,
                })
            }
        }
    }

    /// Returns the recorded outcome for an attempt that is already
    /// terminal. A successful attempt whose order is still unpaid means a
    /// previous pass died mid-settlement; finish its work here, minus the
    /// emails (only the pass that flipped the attempt owns those).
    async fn replay_terminal(
        &self,
        attempt: AttemptModel,
    ) -> Result<ReconcileResult, ServiceError> {
        info!(
            reference = %attempt.reference,
            status = %attempt.status,
            "Replaying recorded outcome"
        );

        if attempt.status == "success" {
            let order_number = self.repair_settlement(&attempt).await?;
            return Ok(ReconcileResult {
                status: ReconcileStatus::Success,
                reference: attempt.reference,
                order_number: Some(order_number),
                failure_reason: None,
            });
        }

        let order_number = self
            .orders
            .get_order(attempt.order_id)
            .await?
            .map(|o| o.order_number);
        Ok(ReconcileResult {
            status: ReconcileStatus::Failed,
            reference: attempt.reference,
            order_number,
            failure_reason: attempt.failure_reason,
        })
    }

    async fn settle_success(
        &self,
        attempt: AttemptModel,
        outcome: VerifyOutcome,
    ) -> Result<ReconcileResult, ServiceError> {
        // A provider "success" for a different amount is a failed
        // reconciliation, not a paid order
        if let Some(paid) = outcome.amount_minor {
            if paid != attempt.amount {
                warn!(
                    reference = %attempt.reference,
                    expected = attempt.amount,
                    paid = paid,
                    "Verified amount does not match attempt amount"
                );
                let mismatched = VerifyOutcome {
                    status: VerifyStatus::Failed,
                    amount_minor: outcome.amount_minor,
                    reason: Some(format!(
                        "amount mismatch: expected {}, provider reports {}",
                        attempt.amount, paid
                    )),
                    raw: outcome.raw,
                };
                return self.settle_failure(attempt, mismatched).await;
            }
        }

        let completed = self
            .attempts
            .complete_attempt(
                &attempt.reference,
                AttemptOutcome::Success,
                CompletionDetails {
                    failure_reason: None,
                    provider_payload: Some(outcome.raw),
                },
            )
            .await?;

        // A concurrent call may have recorded a failure first; honor the
        // row, not this call's verify response
        if completed.attempt.status != "success" {
            let order_number = self
                .orders
                .get_order(completed.attempt.order_id)
                .await?
                .map(|o| o.order_number);
            return Ok(ReconcileResult {
                status: ReconcileStatus::Failed,
                reference: completed.attempt.reference,
                order_number,
                failure_reason: completed.attempt.failure_reason,
            });
        }

        let order_number = self.repair_settlement(&completed.attempt).await?;

        if completed.newly_terminal {
            self.queue_confirmation_emails(&completed.attempt).await?;
            if let Some(sender) = &self.event_sender {
                if let Err(e) = sender
                    .send(Event::PaymentConfirmed {
                        order_id: completed.attempt.order_id,
                        reference: completed.attempt.reference.clone(),
                    })
                    .await
                {
                    warn!(error = %e, "Failed to send payment confirmed event");
                }
            }
            metrics::counter!("reconciliation_success_total", 1);
        }

        Ok(ReconcileResult {
            status: ReconcileStatus::Success,
            reference: completed.attempt.reference,
            order_number: Some(order_number),
            failure_reason: None,
        })
    }

    async fn settle_failure(
        &self,
        attempt: AttemptModel,
        outcome: VerifyOutcome,
    ) -> Result<ReconcileResult, ServiceError> {
        let reason = outcome
            .reason
            .unwrap_or_else(|| "payment was not successful".to_string());

        let completed = self
            .attempts
            .complete_attempt(
                &attempt.reference,
                AttemptOutcome::Failed,
                CompletionDetails {
                    failure_reason: Some(reason.clone()),
                    provider_payload: Some(outcome.raw),
                },
            )
            .await?;

        // Same race in the other direction: a success already on the row
        // wins over this call's failure
        if completed.attempt.status == "success" {
            let order_number = self.repair_settlement(&completed.attempt).await?;
            return Ok(ReconcileResult {
                status: ReconcileStatus::Success,
                reference: completed.attempt.reference,
                order_number: Some(order_number),
                failure_reason: None,
            });
        }

        if completed.newly_terminal {
            if let Some(sender) = &self.event_sender {
                if let Err(e) = sender
                    .send(Event::PaymentDeclined {
                        order_id: completed.attempt.order_id,
                        reference: completed.attempt.reference.clone(),
                        reason: Some(reason.clone()),
                    })
                    .await
                {
                    warn!(error = %e, "Failed to send payment declined event");
                }
            }
            metrics::counter!("reconciliation_failed_total", 1);
        }

        let order_number = self
            .orders
            .get_order(completed.attempt.order_id)
            .await?
            .map(|o| o.order_number);

        Ok(ReconcileResult {
            status: ReconcileStatus::Failed,
            reference: completed.attempt.reference,
            order_number,
            failure_reason: completed.attempt.failure_reason.or(Some(reason)),
        })
    }

    /// Makes the order and settlement row agree with a successful attempt.
    /// Idempotent: the status transition is skipped once the order is paid
    /// and the settlement insert is conflict-ignoring.
    async fn repair_settlement(&self, attempt: &AttemptModel) -> Result<String, ServiceError> {
        let order = self
            .orders
            .get_order(attempt.order_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "attempt {} references missing order {}",
                    attempt.reference, attempt.order_id
                ))
            })?;

        if order.payment_status == PaymentStatus::Unpaid.as_str() {
            self.orders
                .transition_payment_status(
                    attempt.order_id,
                    PaymentStatus::Paid,
                    Some(attempt.reference.clone()),
                )
                .await?;
        }

        self.payments
            .ensure_payment_exists(EnsurePaymentInput {
                reference: attempt.reference.clone(),
                order_id: Some(attempt.order_id),
                amount: attempt.amount,
                payment_method: attempt.provider.clone(),
                email: Some(order.customer_email.clone()),
                metadata: None,
            })
            .await?;

        Ok(order.order_number)
    }

    /// Queues the customer confirmation and the owner alert. Only the pass
    /// that moved the attempt to terminal calls this.
    async fn queue_confirmation_emails(
        &self,
        attempt: &AttemptModel,
    ) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(attempt.order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "order {} missing when queueing emails",
                    attempt.order_id
                ))
            })?;

        let (subject, html) = notifications::order_confirmation_email(&order);
        self.email_queue
            .enqueue(&order.customer_email, &subject, &html)
            .await?;

        let (subject, html) = notifications::owner_order_alert_email(&order);
        self.email_queue
            .enqueue(&self.owner_email, &subject, &html)
            .await?;

        info!(
            order_id = %order.id,
            reference = %attempt.reference,
            "Confirmation emails queued"
        );
        Ok(())
    }
}
