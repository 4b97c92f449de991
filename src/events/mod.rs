use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services. Delivery is best-effort: a full or
/// closed channel is logged and dropped, never an operation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderPaymentStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PaymentConfirmed {
        order_id: Uuid,
        reference: String,
    },
    PaymentDeclined {
        order_id: Uuid,
        reference: String,
        reason: Option<String>,
    },
    EmailSent {
        queue_id: Uuid,
    },
    EmailSendFailed {
        queue_id: Uuid,
        attempts: i32,
    },
    LeadCaptured(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer of the event channel. Currently logs each event;
/// outbound integrations (admin webhooks, analytics) hang off this point.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(id) => info!(order_id = %id, "event: order created"),
            Event::OrderPaymentStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(
                order_id = %order_id,
                old_status = %old_status,
                new_status = %new_status,
                "event: order payment status changed"
            ),
            Event::PaymentConfirmed {
                order_id,
                reference,
            } => info!(order_id = %order_id, reference = %reference, "event: payment confirmed"),
            Event::PaymentDeclined {
                order_id,
                reference,
                reason,
            } => warn!(
                order_id = %order_id,
                reference = %reference,
                reason = reason.as_deref().unwrap_or("unknown"),
                "event: payment declined"
            ),
            Event::EmailSent { queue_id } => info!(queue_id = %queue_id, "event: email sent"),
            Event::EmailSendFailed { queue_id, attempts } => {
                warn!(queue_id = %queue_id, attempts = attempts, "event: email send failed")
            }
            Event::LeadCaptured(id) => info!(lead_id = %id, "event: lead captured"),
        }
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_is_an_error_not_a_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::LeadCaptured(Uuid::new_v4())).await.is_err());
    }
}
