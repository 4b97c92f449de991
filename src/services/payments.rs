use crate::{
    db::DbPool,
    entities::payment::{
        self, ActiveModel as PaymentActiveModel, Entity as PaymentEntity, Model as PaymentModel,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for the idempotent settlement upsert.
#[derive(Debug, Clone)]
pub struct EnsurePaymentInput {
    pub reference: String,
    pub order_id: Option<Uuid>,
    pub amount: i64,
    pub payment_method: String,
    pub email: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Settlement records: one row of confirmed money movement per reference.
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Ensures a settlement row exists for the reference, idempotently.
    ///
    /// Implemented as an atomic insert-ignore-conflict followed by a read,
    /// not check-then-insert: two reconciliation calls racing past the
    /// terminal-state check both land here, and the unique constraint on
    /// `reference` is the arbiter. Whichever insert loses simply reads the
    /// winner's row back.
    #[instrument(skip(self, input), fields(reference = %input.reference))]
    pub async fn ensure_payment_exists(
        &self,
        input: EnsurePaymentInput,
    ) -> Result<PaymentModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let active = PaymentActiveModel {
            id: Set(Uuid::new_v4()),
            reference: Set(input.reference.clone()),
            order_id: Set(input.order_id),
            amount: Set(input.amount),
            status: Set("completed".to_string()),
            payment_method: Set(input.payment_method),
            email: Set(input.email),
            metadata: Set(input.metadata),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = PaymentEntity::insert(active)
            .on_conflict(
                OnConflict::column(payment::Column::Reference)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        if inserted > 0 {
            info!(reference = %input.reference, "Settlement record created");
        } else {
            info!(reference = %input.reference, "Settlement record already present");
        }

        self.find_by_reference(&input.reference)
            .await?
            .ok_or_else(|| {
                // Insert reported conflict but the row is missing: only a
                // concurrent delete could cause this
                ServiceError::InternalError(format!(
                    "settlement row missing after upsert for {}",
                    input.reference
                ))
            })
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentModel>, ServiceError> {
        Ok(PaymentEntity::find()
            .filter(payment::Column::Reference.eq(reference))
            .one(&*self.db_pool)
            .await?)
    }

    /// Lists settlement records with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<PaymentModel>, u64), ServiceError> {
        let paginator = PaymentEntity::find()
            .order_by_desc(payment::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let payments = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((payments, total))
    }
}
