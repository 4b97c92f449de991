use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per payment initiation. The unique `reference` is the
/// idempotency key correlating checkout, gateway transaction, and
/// settlement record; status moves exactly once from `pending` to the
/// terminal `success` or `failed`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    #[sea_orm(unique)]
    pub reference: String,
    pub provider: String,
    pub amount: i64,
    pub currency: String,
    /// pending, success, failed
    pub status: String,
    pub attempt_number: i32,
    pub failure_reason: Option<String>,
    /// Raw provider verification payload, opaque to application logic
    pub provider_payload: Option<Json>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_terminal(&self) -> bool {
        self.status == "success" || self.status == "failed"
    }
}
