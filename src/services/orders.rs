use crate::{
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
    },
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
        Model as OrderItemModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::payment_attempts::is_unique_violation,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order payment status with the allowed transition graph
/// `unpaid -> paid -> refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Unpaid, Self::Paid) | (Self::Paid, Self::Refunded)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub product_name: String,
    /// Unit price in minor currency units
    pub unit_price: i64,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(email(message = "Customer email must be valid"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "Customer phone is required"))]
    pub customer_phone: String,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<OrderItemInput>,
    /// Sum of line totals, minor currency units
    pub subtotal: i64,
    #[serde(default)]
    pub delivery_fee: i64,
    /// Must equal subtotal + delivery_fee
    pub total: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_delivery_method")]
    pub delivery_method: String,
    pub delivery_address: Option<String>,
    pub pickup_location: Option<String>,
    /// Client-generated key making the whole checkout submission
    /// idempotent: a replay with the same key returns the original order
    /// (and, downstream, its payment reference) instead of a sibling
    pub idempotency_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

fn default_currency() -> String {
    "NGN".to_string()
}

fn default_delivery_method() -> String {
    "delivery".to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub delivery_method: String,
    pub delivery_address: Option<String>,
    pub pickup_location: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Generates a human-readable order number, e.g. `SF-483920-K7Q2M`.
fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    let mut rng = rand::thread_rng();
    let random: String = (0..5)
        .map(|_| {
            const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
            CHARSET[rng.gen_range(0..CHARSET.len())] as char
        })
        .collect();
    format!("SF-{}-{}", tail, random)
}

/// Validates the arithmetic invariant of a checkout submission:
/// every line has positive quantity and price, line totals sum to the
/// subtotal, and total = subtotal + delivery_fee, all in exact integer
/// minor units.
fn validate_totals(request: &CreateOrderRequest) -> Result<Vec<i64>, ServiceError> {
    if request.delivery_fee < 0 {
        return Err(ServiceError::ValidationError(
            "delivery_fee must not be negative".to_string(),
        ));
    }

    let mut line_totals = Vec::with_capacity(request.items.len());
    let mut computed_subtotal: i64 = 0;
    for (idx, item) in request.items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "item {}: quantity must be positive",
                idx
            )));
        }
        if item.unit_price <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "item {}: unit_price must be positive",
                idx
            )));
        }
        let line_total = item
            .unit_price
            .checked_mul(item.quantity as i64)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("item {}: line total overflows", idx))
            })?;
        computed_subtotal = computed_subtotal.checked_add(line_total).ok_or_else(|| {
            ServiceError::ValidationError("subtotal overflows".to_string())
        })?;
        line_totals.push(line_total);
    }

    if computed_subtotal != request.subtotal {
        return Err(ServiceError::ValidationError(format!(
            "subtotal mismatch: items sum to {}, got {}",
            computed_subtotal, request.subtotal
        )));
    }

    let expected_total = request
        .subtotal
        .checked_add(request.delivery_fee)
        .ok_or_else(|| ServiceError::ValidationError("total overflows".to_string()))?;
    if expected_total != request.total {
        return Err(ServiceError::ValidationError(format!(
            "total mismatch: subtotal + delivery_fee = {}, got {}",
            expected_total, request.total
        )));
    }

    Ok(line_totals)
}

/// Service for order persistence and status transitions. Orders are
/// immutable after creation except for the status columns, which only the
/// reconciliation coordinator and admin actions touch.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new order with its line items in one transaction.
    #[instrument(skip(self, request), fields(customer_email = %request.customer_email))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate().map_err(ServiceError::from)?;
        let line_totals = validate_totals(&request)?;

        // Replay of an already-processed checkout submission returns the
        // original order; the unique index on the key closes the race below
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                info!(
                    order_id = %existing.id,
                    order_number = %existing.order_number,
                    "Checkout replay, returning existing order"
                );
                return Ok(existing);
            }
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_name: Set(request.customer_name.clone()),
            customer_email: Set(request.customer_email.clone()),
            customer_phone: Set(request.customer_phone.clone()),
            subtotal: Set(request.subtotal),
            delivery_fee: Set(request.delivery_fee),
            total: Set(request.total),
            currency: Set(request.currency.clone()),
            status: Set("pending".to_string()),
            payment_status: Set(PaymentStatus::Unpaid.as_str().to_string()),
            delivery_method: Set(request.delivery_method.clone()),
            delivery_address: Set(request.delivery_address.clone()),
            pickup_location: Set(request.pickup_location.clone()),
            payment_reference: Set(None),
            idempotency_key: Set(request.idempotency_key.clone()),
            metadata: Set(request.metadata.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let order_model = match order_active_model.insert(&txn).await {
            Ok(model) => model,
            // A concurrent identical submission won the unique-key race;
            // abandon this insert and hand back the winner's order
            Err(e) if is_unique_violation(&e) && request.idempotency_key.is_some() => {
                txn.rollback().await?;
                let key = request.idempotency_key.as_deref().unwrap_or_default();
                return self.find_by_idempotency_key(key).await?.ok_or_else(|| {
                    ServiceError::Conflict(
                        "checkout submission already in flight, retry".to_string(),
                    )
                });
            }
            Err(e) => {
                error!(error = %e, order_id = %order_id, "Failed to create order");
                return Err(ServiceError::DatabaseError(e));
            }
        };

        let mut item_responses = Vec::with_capacity(request.items.len());
        for (item, line_total) in request.items.iter().zip(line_totals) {
            let item_id = Uuid::new_v4();
            let item_model = OrderItemActiveModel {
                id: Set(item_id),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(item.quantity),
                line_total: Set(line_total),
                product_snapshot: Set(None),
                created_at: Set(now),
            };
            let inserted = item_model.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
            item_responses.push(item_to_response(inserted));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_number, total = request.total, "Order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        let mut response = model_to_response(order_model);
        response.items = Some(item_responses);
        Ok(response)
    }

    /// Finds the order created by a previous submission with this key.
    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::IdempotencyKey.eq(key))
            .one(&*self.db_pool)
            .await?;
        match order {
            Some(model) => self.get_order_with_items(model.id).await,
            None => Ok(None),
        }
    }

    /// Retrieves an order header by ID.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?;
        Ok(order.map(model_to_response))
    }

    /// Retrieves an order with its line items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let order = match OrderEntity::find_by_id(order_id).one(&*self.db_pool).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        let mut response = model_to_response(order);
        response.items = Some(items.into_iter().map(item_to_response).collect());
        Ok(Some(response))
    }

    /// Lists orders with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let paginator = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(model_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Transitions an order's payment status. Only `unpaid -> paid` and
    /// `paid -> refunded` are allowed; a successful `paid` transition also
    /// moves the lifecycle status to `processing`.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status.as_str()))]
    pub async fn transition_payment_status(
        &self,
        order_id: Uuid,
        new_status: PaymentStatus,
        payment_reference: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let current = PaymentStatus::parse(&order.payment_status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "order {} has unknown payment status {}",
                order_id, order.payment_status
            ))
        })?;

        if !current.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "payment status {} -> {} is not allowed",
                current.as_str(),
                new_status.as_str()
            )));
        }

        let old_status = order.payment_status.clone();
        let mut active: OrderActiveModel = order.into();
        active.payment_status = Set(new_status.as_str().to_string());
        if new_status == PaymentStatus::Paid {
            active.status = Set("processing".to_string());
        }
        if let Some(reference) = payment_reference {
            active.payment_reference = Set(Some(reference));
        }
        active.updated_at = Set(now);

        let updated = active.update(db).await?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status.as_str(),
            "Order payment status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderPaymentStatusChanged {
                    order_id,
                    old_status,
                    new_status: new_status.as_str().to_string(),
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send payment status event");
            }
        }

        Ok(model_to_response(updated))
    }

}

fn model_to_response(model: OrderModel) -> OrderResponse {
    OrderResponse {
        id: model.id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_phone: model.customer_phone,
        subtotal: model.subtotal,
        delivery_fee: model.delivery_fee,
        total: model.total,
        currency: model.currency,
        status: model.status,
        payment_status: model.payment_status,
        delivery_method: model.delivery_method,
        delivery_address: model.delivery_address,
        pickup_location: model.pickup_location,
        payment_reference: model.payment_reference,
        created_at: model.created_at,
        updated_at: model.updated_at,
        items: None,
    }
}

fn item_to_response(model: OrderItemModel) -> OrderItemResponse {
    OrderItemResponse {
        id: model.id,
        product_id: model.product_id,
        product_name: model.product_name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        line_total: model.line_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(items: Vec<OrderItemInput>, subtotal: i64, fee: i64, total: i64) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "Ada Obi".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: "+2348012345678".to_string(),
            items,
            subtotal,
            delivery_fee: fee,
            total,
            currency: "NGN".to_string(),
            delivery_method: "delivery".to_string(),
            delivery_address: Some("12 Marina Rd, Lagos".to_string()),
            pickup_location: None,
            idempotency_key: None,
            metadata: None,
        }
    }

    fn item(price: i64, qty: i32) -> OrderItemInput {
        OrderItemInput {
            product_id: None,
            product_name: "Quantum Plate".to_string(),
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn totals_accept_exact_arithmetic() {
        let req = request_with(vec![item(49300, 2)], 98600, 0, 98600);
        let line_totals = validate_totals(&req).unwrap();
        assert_eq!(line_totals, vec![98600]);
    }

    #[test]
    fn totals_reject_subtotal_mismatch() {
        let req = request_with(vec![item(49300, 2)], 98599, 0, 98599);
        assert!(matches!(
            validate_totals(&req),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn totals_reject_total_mismatch() {
        let req = request_with(vec![item(1000, 1)], 1000, 500, 1600);
        assert!(matches!(
            validate_totals(&req),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn totals_reject_non_positive_quantity_and_price() {
        let req = request_with(vec![item(1000, 0)], 0, 0, 0);
        assert!(validate_totals(&req).is_err());
        let req = request_with(vec![item(0, 1)], 0, 0, 0);
        assert!(validate_totals(&req).is_err());
        let req = request_with(vec![item(-5, 1)], -5, 0, -5);
        assert!(validate_totals(&req).is_err());
    }

    #[test]
    fn totals_reject_negative_delivery_fee() {
        let req = request_with(vec![item(1000, 1)], 1000, -100, 900);
        assert!(validate_totals(&req).is_err());
    }

    #[test]
    fn payment_status_transition_graph() {
        use PaymentStatus::*;
        assert!(Unpaid.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Unpaid.can_transition_to(Refunded));
        assert!(!Paid.can_transition_to(Unpaid));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Paid));
    }

    #[test]
    fn order_number_shape() {
        let n = generate_order_number();
        assert!(n.starts_with("SF-"));
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 5);
    }
}
