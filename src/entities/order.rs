use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order header. Monetary columns are integer minor currency units;
/// `total = subtotal + delivery_fee` is enforced at creation and the row is
/// immutable afterwards except for the status columns.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
    pub currency: String,
    /// Lifecycle status: pending, processing, fulfilled, cancelled
    pub status: String,
    /// Payment status: unpaid, paid, refunded
    pub payment_status: String,
    /// "delivery" or "pickup"
    pub delivery_method: String,
    pub delivery_address: Option<String>,
    pub pickup_location: Option<String>,
    /// Reference of the winning payment attempt, set on reconciliation
    pub payment_reference: Option<String>,
    /// Client-supplied checkout key; unique, so replayed submissions land
    /// on this row instead of creating a sibling order
    pub idempotency_key: Option<String>,
    pub metadata: Option<Json>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::payment_attempt::Entity")]
    PaymentAttempt,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::payment_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentAttempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
