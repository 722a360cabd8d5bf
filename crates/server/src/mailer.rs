//! Outbound mail transport seam.
//!
//! Production uses lettre's pooled SMTP transport; tests plug in recording or
//! failing implementations.

use async_trait::async_trait;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Mail transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), MailError>;
}

#[async_trait]
impl Mailer for AsyncSmtpTransport<Tokio1Executor> {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        AsyncTransport::send(self, message).await?;
        Ok(())
    }
}
