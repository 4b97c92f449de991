pub mod email_queue;
pub mod leads;
pub mod orders;
pub mod payment_attempts;
pub mod payments;
pub mod reconciliation;
