use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events emitted by the services. Consumers run out-of-band on the
/// event channel; senders never wait for processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    CategoryCreated(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),

    // Review events
    ReviewCreated { product_id: Uuid, review_id: Uuid },

    // Order events
    OrderCreated(Uuid),
    OrderPaid(Uuid),

    // Account events
    UserRegistered(Uuid),
    EmailVerified(Uuid),
    PasswordResetRequested(Uuid),

    // Notification events
    EmailQueued {
        to: String,
        subject: String,
        body: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
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

/// Background event processor. Email delivery mechanics are out of scope for
/// this service; queued emails are logged at the point they would be handed
/// to the delivery provider.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::EmailQueued { to, subject, .. } => {
                info!(to = %to, subject = %subject, "email handed to delivery backend");
            }
            Event::OrderPaid(order_id) => {
                info!(order_id = %order_id, "order marked paid");
            }
            other => {
                debug!(event = ?other, "event processed");
            }
        }
    }
    warn!("event channel closed; processor exiting");
}
