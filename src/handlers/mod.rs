//! Message handlers: actions run once per message matched by a classifier
//!
//! - [`PrintHandler`] - print the message to stdout
//! - [`LabelHandler`], [`TrashHandler`], [`UntrashHandler`] - mailbox changes
//! - [`SaveJsonHandler`], [`DownloadAttachmentsHandler`] - write to disk
//! - [`ForwardHandler`] - forward the original as an attachment
//! - [`Pipeline`] - run several handlers in order
//! - [`FnHandler`] - wrap a closure

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::HandlerError;
use crate::models::GmailMessage;

mod forward;
mod mailbox;
mod storage;

pub use forward::ForwardHandler;
pub use mailbox::{LabelHandler, TrashHandler, UntrashHandler};
pub use storage::{attachment_file_name, DownloadAttachmentsHandler, SaveJsonHandler};

/// An action invoked with each matched message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message. An error aborts only this message.
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError>;

    /// Short human-readable description used in logs and dry runs
    fn describe(&self) -> String;
}

/// Prints each message to stdout
#[derive(Debug, Default)]
pub struct PrintHandler;

impl PrintHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for PrintHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        println!("{}", message);
        Ok(())
    }

    fn describe(&self) -> String {
        "print".to_string()
    }
}

/// Runs handlers in order, stopping at the first failure
pub struct Pipeline {
    steps: Vec<Box<dyn MessageHandler>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn MessageHandler>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl MessageHandler for Pipeline {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        for step in &self.steps {
            debug!("Running {} on message {}", step.describe(), message.id);
            step.invoke(message).await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Logs what a handler would do instead of doing it
pub struct DryRunHandler {
    planned: String,
}

impl DryRunHandler {
    /// Wrap the description of the handler that would have run
    pub fn new(inner: &dyn MessageHandler) -> Self {
        Self {
            planned: inner.describe(),
        }
    }
}

#[async_trait]
impl MessageHandler for DryRunHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        info!(
            "[dry run] {} ({:?}): would run {}",
            message.id, message.subject, self.planned
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("dry-run({})", self.planned)
    }
}

/// Adapts a closure into a handler
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&GmailMessage) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&GmailMessage) -> Result<(), HandlerError> + Send + Sync,
{
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        (self.f)(message)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::GmailMessage;

    pub fn message(id: &str) -> GmailMessage {
        GmailMessage {
            id: id.to_string(),
            thread_id: format!("thread_{}", id),
            label_ids: vec!["INBOX".to_string()],
            snippet: "snippet".to_string(),
            history_id: None,
            internal_date: None,
            size_estimate: None,
            from: "Sender <sender@example.com>".to_string(),
            to: vec!["me@example.com".to_string()],
            subject: format!("Subject {}", id),
            date: Some("Mon, 1 Jan 2024 10:00:00 +0000".to_string()),
            body_text: Some("body".to_string()),
            attachments: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::message;
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(name: &str, log: Arc<Mutex<Vec<String>>>, fail: bool) -> Box<dyn MessageHandler> {
        let name = name.to_string();
        Box::new(FnHandler::new(name.clone(), move |msg: &GmailMessage| {
            log.lock().unwrap().push(format!("{}:{}", name, msg.id));
            if fail {
                Err(HandlerError::failed(format!("{} failed", name)))
            } else {
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn test_pipeline_runs_steps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            recorder("download", Arc::clone(&log), false),
            recorder("label", Arc::clone(&log), false),
        ]);

        pipeline.invoke(&message("m1")).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["download:m1", "label:m1"]);
        assert_eq!(pipeline.describe(), "download -> label");
    }

    #[tokio::test]
    async fn test_pipeline_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            recorder("download", Arc::clone(&log), true),
            recorder("label", Arc::clone(&log), false),
        ]);

        let err = pipeline.invoke(&message("m1")).await.unwrap_err();
        assert_eq!(err.to_string(), "download failed");
        assert_eq!(*log.lock().unwrap(), vec!["download:m1"]);
    }

    #[tokio::test]
    async fn test_dry_run_handler_never_runs_inner() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = recorder("trash", Arc::clone(&log), true);
        let dry = DryRunHandler::new(inner.as_ref());

        dry.invoke(&message("m1")).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(dry.describe(), "dry-run(trash)");
    }

    #[tokio::test]
    async fn test_print_handler() {
        let handler = PrintHandler::new();
        handler.invoke(&message("m1")).await.unwrap();
        assert_eq!(handler.describe(), "print");
    }
}
