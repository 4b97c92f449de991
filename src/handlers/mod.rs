pub mod checkout;
pub mod common;
pub mod email_webhooks;
pub mod email_worker;
pub mod leads;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
