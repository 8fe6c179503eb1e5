use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use std::sync::Arc;
use tracing::info;

use super::MessageHandler;
use crate::client::GmailClient;
use crate::error::HandlerError;
use crate::models::GmailMessage;

/// Forwards each message to fixed recipients with the original attached as `message/rfc822`
pub struct ForwardHandler {
    client: Arc<dyn GmailClient>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl ForwardHandler {
    pub fn new(client: Arc<dyn GmailClient>, from: Mailbox, to: Vec<Mailbox>) -> Self {
        Self { client, from, to }
    }

    /// Forward from the authenticated account's own address
    pub async fn from_account(
        client: Arc<dyn GmailClient>,
        to: &[String],
    ) -> Result<Self, HandlerError> {
        let from: Mailbox = client.profile_email().await?.parse()?;
        let to = to
            .iter()
            .map(|addr| addr.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(client, from, to))
    }

    /// Build the outgoing RFC 5322 message
    pub fn build(&self, message: &GmailMessage, original: Vec<u8>) -> Result<Vec<u8>, HandlerError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("Fwd: {}", message.subject));
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        let intro = format!(
            "---------- Forwarded message ----------\nFrom: {}\nDate: {}\nSubject: {}\n",
            message.from,
            message.date.as_deref().unwrap_or("unknown"),
            message.subject
        );
        let rfc822 = ContentType::parse("message/rfc822")
            .map_err(|e| HandlerError::Email(e.to_string()))?;

        let email = builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(intro))
                .singlepart(Attachment::new(format!("{}.eml", message.id)).body(original, rfc822)),
        )?;
        Ok(email.formatted())
    }
}

#[async_trait]
impl MessageHandler for ForwardHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        let original = self.client.get_raw_message(&message.id).await?;
        let outgoing = self.build(message, original)?;
        let sent_id = self.client.send_raw(outgoing).await?;
        info!(
            "Forwarded {} to {} (sent as {})",
            message.id,
            self.describe_recipients(),
            sent_id
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("forward({})", self.describe_recipients())
    }
}

impl ForwardHandler {
    fn describe_recipients(&self) -> String {
        self.to
            .iter()
            .map(|m| m.email.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
