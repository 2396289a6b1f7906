use tracing::warn;

use crate::events::{Event, EventSender};

/// Fire-and-forget email enqueueing. Messages go onto the event channel and
/// the processor hands them to the delivery backend; a full channel never
/// fails the calling request.
pub struct NotificationService {
    event_sender: EventSender,
    from: String,
}

impl NotificationService {
    pub fn new(event_sender: EventSender, from: String) -> Self {
        Self { event_sender, from }
    }

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) {
        let event = Event::EmailQueued {
            to: to.to_string(),
            subject: subject.to_string(),
            body: format!("From: {}\n\n{}", self.from, body),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(to = %to, error = %e, "failed to enqueue email notification");
        }
    }

    pub async fn send_verification_email(&self, to: &str, token: &str) {
        self.send_email(
            to,
            "Confirm your email",
            &format!("Use this token to confirm your account: {token}"),
        )
        .await;
    }

    pub async fn send_password_reset_email(&self, to: &str, token: &str) {
        self.send_email(
            to,
            "Reset your password",
            &format!("Use this token to reset your password: {token}"),
        )
        .await;
    }
}
