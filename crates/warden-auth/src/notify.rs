//! Best-effort user notifications

use async_trait::async_trait;
use tracing::{info, warn};

use crate::traits::{Authenticatable, Notifier};
use crate::AuthResult;

/// Send a message to a user if they have an email address.
///
/// Delivery failures are logged and swallowed; returns whether the notifier
/// accepted the message.
pub async fn notify_user<U: Authenticatable>(
    notifier: &dyn Notifier,
    user: &U,
    subject: &str,
    body: &str,
) -> bool {
    let Some(email) = user.email().filter(|email| !email.is_empty()) else {
        return false;
    };

    match notifier.send(email, subject, body).await {
        Ok(()) => true,
        Err(err) => {
            warn!(user_id = %user.id(), error = %err, "notification failed");
            false
        }
    }
}

/// Notifier that writes messages to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()> {
        info!(to, subject, body_len = body.len(), "notification");
        Ok(())
    }
}
