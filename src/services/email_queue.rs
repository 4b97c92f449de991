use crate::{
    db::DbPool,
    entities::email_queue_item::{
        self, ActiveModel as QueueActiveModel, Entity as QueueEntity, Model as QueueModel,
    },
    errors::ServiceError,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Retry delay after the n-th failure, in minutes: n squared. The square
/// spreads retries out quickly (1, 4, 9, 16, 25, ...) without needing a
/// configurable ceiling on the spacing itself.
pub fn backoff_minutes(attempts: i32) -> i64 {
    let n = attempts.max(0) as i64;
    n * n
}

/// Durable outbound email queue. Producers insert, the dispatcher claims
/// due rows and reports back. `claim_due` is a plain read, so delivery is
/// at-least-once by design; a duplicate notification is tolerable where a
/// lost one is not.
#[derive(Clone)]
pub struct EmailQueueService {
    db_pool: Arc<DbPool>,
    /// Rows at or past this many failed attempts stop being claimed
    max_attempts: i32,
}

impl EmailQueueService {
    pub fn new(db_pool: Arc<DbPool>, max_attempts: i32) -> Self {
        Self {
            db_pool,
            max_attempts,
        }
    }

    /// Inserts a message with attempts = 0, due immediately.
    #[instrument(skip(self, html), fields(recipient = %recipient, subject = %subject))]
    pub async fn enqueue(
        &self,
        recipient: &str,
        subject: &str,
        html: &str,
    ) -> Result<QueueModel, ServiceError> {
        let now = Utc::now();
        let item = QueueActiveModel {
            id: Set(Uuid::new_v4()),
            recipient: Set(recipient.to_string()),
            subject: Set(subject.to_string()),
            html: Set(html.to_string()),
            attempts: Set(0),
            last_error: Set(None),
            next_try: Set(now),
            created_at: Set(now),
        };
        let inserted = item.insert(&*self.db_pool).await?;
        info!(queue_id = %inserted.id, "Email enqueued");
        Ok(inserted)
    }

    /// Returns up to `limit` due rows, oldest first. Skips rows that have
    /// exhausted their attempt budget; those stay in the table as a
    /// visible dead-letter set.
    #[instrument(skip(self))]
    pub async fn claim_due(&self, limit: u64) -> Result<Vec<QueueModel>, ServiceError> {
        let now = Utc::now();
        Ok(QueueEntity::find()
            .filter(email_queue_item::Column::NextTry.lte(now))
            .filter(email_queue_item::Column::Attempts.lt(self.max_attempts))
            .order_by_asc(email_queue_item::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db_pool)
            .await?)
    }

    /// Removes a delivered message from the queue.
    #[instrument(skip(self))]
    pub async fn mark_sent(&self, id: Uuid) -> Result<(), ServiceError> {
        let item = QueueEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("queue item {} not found", id)))?;
        item.delete(&*self.db_pool).await?;
        info!(queue_id = %id, "Email removed from queue after delivery");
        Ok(())
    }

    /// Records a failed send: bumps the attempt counter and pushes the next
    /// try out by `attempts²` minutes.
    #[instrument(skip(self, error))]
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<QueueModel, ServiceError> {
        let item = QueueEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("queue item {} not found", id)))?;

        let attempts = item.attempts + 1;
        let next_try = Utc::now() + Duration::minutes(backoff_minutes(attempts));

        let mut active: QueueActiveModel = item.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.next_try = Set(next_try);
        let updated = active.update(&*self.db_pool).await?;

        if attempts >= self.max_attempts {
            warn!(queue_id = %id, attempts = attempts, "Email abandoned after retry budget");
        } else {
            info!(queue_id = %id, attempts = attempts, next_try = %next_try, "Email send failed, rescheduled");
        }
        Ok(updated)
    }

    /// All queue rows, oldest first (admin visibility, including the
    /// abandoned dead-letter set).
    pub async fn list_all(&self) -> Result<Vec<QueueModel>, ServiceError> {
        Ok(QueueEntity::find()
            .order_by_asc(email_queue_item::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }
}
