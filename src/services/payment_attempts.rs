use crate::{
    db::DbPool,
    entities::order::Entity as OrderEntity,
    entities::payment_attempt::{
        self, ActiveModel as AttemptActiveModel, Entity as AttemptEntity, Model as AttemptModel,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Terminal outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Details recorded when an attempt reaches a terminal state.
#[derive(Debug, Clone, Default)]
pub struct CompletionDetails {
    pub failure_reason: Option<String>,
    pub provider_payload: Option<serde_json::Value>,
}

/// Result of `complete_attempt`. `newly_terminal` is true only for the one
/// call that moved the attempt out of `pending`; replays get `false` and
/// the previously recorded row.
#[derive(Debug, Clone)]
pub struct CompletedAttempt {
    pub attempt: AttemptModel,
    pub newly_terminal: bool,
}

/// Generates a payment reference: the idempotency key correlating a
/// checkout attempt, gateway transaction, and settlement record. Generated
/// once and persisted; URL-safe for redirect embedding.
fn generate_reference() -> String {
    format!("ref_{}", Uuid::new_v4().simple())
}

/// True when a database error is a unique-constraint violation, which a
/// caller should surface as a retryable conflict rather than a crash.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("unique") || msg.contains("duplicate key")
}

/// Tracks one row per payment initiation. Owns the idempotency-key
/// lifecycle: a pending attempt is reused on resubmission, a failed one is
/// superseded by a fresh reference under the next attempt number.
#[derive(Clone)]
pub struct PaymentAttemptService {
    db_pool: Arc<DbPool>,
}

impl PaymentAttemptService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Records (or reuses) a payment attempt for an order.
    ///
    /// Re-submission of the same checkout intent (double-click, browser
    /// back-and-resubmit) lands on the existing pending attempt and its
    /// reference instead of creating a second charge path.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn record_attempt(
        &self,
        order_id: Uuid,
        amount: i64,
        currency: &str,
        provider: &str,
    ) -> Result<AttemptModel, ServiceError> {
        let db = &*self.db_pool;

        OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let latest = AttemptEntity::find()
            .filter(payment_attempt::Column::OrderId.eq(order_id))
            .order_by_desc(payment_attempt::Column::AttemptNumber)
            .one(db)
            .await?;

        let attempt_number = match latest {
            Some(existing) if existing.status == "pending" => {
                info!(
                    order_id = %order_id,
                    reference = %existing.reference,
                    "Reusing pending payment attempt"
                );
                return Ok(existing);
            }
            Some(existing) if existing.status == "success" => {
                return Err(ServiceError::Conflict(format!(
                    "order {} already has a successful payment ({})",
                    order_id, existing.reference
                )));
            }
            // Prior attempt failed: issue the next attempt number under a
            // fresh reference
            Some(existing) => existing.attempt_number + 1,
            None => 1,
        };

        let attempt = AttemptActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            reference: Set(generate_reference()),
            provider: Set(provider.to_string()),
            amount: Set(amount),
            currency: Set(currency.to_string()),
            status: Set("pending".to_string()),
            attempt_number: Set(attempt_number),
            failure_reason: Set(None),
            provider_payload: Set(None),
            initiated_at: Set(Utc::now()),
            completed_at: Set(None),
        };

        let inserted = attempt.insert(db).await.map_err(|e| {
            if is_unique_violation(&e) {
                // Reference collision or a concurrent insert won; retryable
                warn!(order_id = %order_id, "Payment attempt insert hit unique constraint");
                ServiceError::Conflict("payment attempt already exists, retry".to_string())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(
            order_id = %order_id,
            reference = %inserted.reference,
            attempt_number = inserted.attempt_number,
            "Payment attempt recorded"
        );
        Ok(inserted)
    }

    /// Looks up an attempt by its payment reference.
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<AttemptModel>, ServiceError> {
        Ok(AttemptEntity::find()
            .filter(payment_attempt::Column::Reference.eq(reference))
            .one(&*self.db_pool)
            .await?)
    }

    /// Moves an attempt to a terminal state exactly once.
    ///
    /// The flip out of `pending` is a conditional update filtered on the
    /// current status, so of any number of concurrent callers exactly one
    /// sees `newly_terminal = true`; everyone else (including replays
    /// against an already-terminal attempt) reads the recorded outcome
    /// back with `false`, which is what lets the coordinator run side
    /// effects at most once per reference.
    #[instrument(skip(self, details), fields(reference = %reference, outcome = %outcome.as_str()))]
    pub async fn complete_attempt(
        &self,
        reference: &str,
        outcome: AttemptOutcome,
        details: CompletionDetails,
    ) -> Result<CompletedAttempt, ServiceError> {
        let db = &*self.db_pool;

        let mut terminal = AttemptActiveModel {
            status: Set(outcome.as_str().to_string()),
            failure_reason: Set(details.failure_reason),
            completed_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        if details.provider_payload.is_some() {
            terminal.provider_payload = Set(details.provider_payload);
        }

        let result = AttemptEntity::update_many()
            .set(terminal)
            .filter(payment_attempt::Column::Reference.eq(reference))
            .filter(payment_attempt::Column::Status.eq("pending"))
            .exec(db)
            .await?;
        let newly_terminal = result.rows_affected == 1;

        let attempt = self.find_by_reference(reference).await?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "payment attempt not found for reference {}",
                reference
            ))
        })?;

        if newly_terminal {
            info!(reference = %reference, status = %attempt.status, "Payment attempt completed");
        } else {
            info!(
                reference = %reference,
                status = %attempt.status,
                "Attempt already terminal; returning recorded outcome"
            );
        }
        Ok(CompletedAttempt {
            attempt,
            newly_terminal,
        })
    }

    /// Lists attempts for an order, oldest first.
    pub async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<AttemptModel>, ServiceError> {
        Ok(AttemptEntity::find()
            .filter(payment_attempt::Column::OrderId.eq(order_id))
            .order_by_asc(payment_attempt::Column::AttemptNumber)
            .all(&*self.db_pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_distinct_and_url_safe() {
        let a = generate_reference();
        let b = generate_reference();
        assert_ne!(a, b);
        assert!(a.starts_with("ref_"));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn unique_violation_detection() {
        let err = DbErr::Custom("UNIQUE constraint failed: payment_attempts.reference".into());
        assert!(is_unique_violation(&err));
        let err = DbErr::Custom("duplicate key value violates unique constraint".into());
        assert!(is_unique_violation(&err));
        let err = DbErr::Custom("connection reset".into());
        assert!(!is_unique_violation(&err));
    }
}
