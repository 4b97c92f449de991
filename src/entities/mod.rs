pub mod email_delivery;
pub mod email_queue_item;
pub mod lead;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod payment_attempt;
