//! Delivery of password-reset links.
//!
//! The forgot-password handler decides *whether* to send; a [`ResetMailer`]
//! does the sending. [`LogMailer`] writes the link to the log and is what the
//! server runs with until an SMTP transport is plugged in.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Email failed: {0}")]
    DeliveryFailed(String),
}

#[async_trait]
pub trait ResetMailer: Send + Sync {
    /// Send `reset_link` to `email`.
    async fn send_reset(&self, email: &str, reset_link: &str) -> Result<(), MailError>;
}

/// Build the frontend link carrying a reset token.
pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

/// Mailer that only logs the link.
pub struct LogMailer;

#[async_trait]
impl ResetMailer for LogMailer {
    async fn send_reset(&self, email: &str, reset_link: &str) -> Result<(), MailError> {
        tracing::info!(recipient = %email, link = %reset_link, "password reset link issued");
        Ok(())
    }
}
