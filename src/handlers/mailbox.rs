use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::MessageHandler;
use crate::client::GmailClient;
use crate::error::HandlerError;
use crate::models::GmailMessage;

/// Adds and removes labels on each message
///
/// Takes label ids; names are resolved once at startup by [`crate::labels`].
pub struct LabelHandler {
    client: Arc<dyn GmailClient>,
    add_label_ids: Vec<String>,
    remove_label_ids: Vec<String>,
    description: String,
}

impl LabelHandler {
    pub fn new(
        client: Arc<dyn GmailClient>,
        add_label_ids: Vec<String>,
        remove_label_ids: Vec<String>,
    ) -> Self {
        let description = format!(
            "label(+[{}] -[{}])",
            add_label_ids.join(", "),
            remove_label_ids.join(", ")
        );
        Self {
            client,
            add_label_ids,
            remove_label_ids,
            description,
        }
    }

    /// Override the description, e.g. with label names instead of ids
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl MessageHandler for LabelHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        let modified = self
            .client
            .modify_labels(
                std::slice::from_ref(&message.id),
                &self.add_label_ids,
                &self.remove_label_ids,
            )
            .await?;
        debug!("Relabelled {} message(s) for {}", modified, message.id);
        Ok(())
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Moves each message to trash
///
/// Trashed messages only match later searches that include `in:trash`.
pub struct TrashHandler {
    client: Arc<dyn GmailClient>,
}

impl TrashHandler {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageHandler for TrashHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        self.client.trash_message(&message.id).await?;
        debug!("Moved {} to trash", message.id);
        Ok(())
    }

    fn describe(&self) -> String {
        "trash".to_string()
    }
}

/// Restores each message from trash
pub struct UntrashHandler {
    client: Arc<dyn GmailClient>,
}

impl UntrashHandler {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageHandler for UntrashHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        self.client.untrash_message(&message.id).await?;
        debug!("Restored {} from trash", message.id);
        Ok(())
    }

    fn describe(&self) -> String {
        "untrash".to_string()
    }
}
