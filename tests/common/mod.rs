//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use gmail_classifiers::client::{GmailClient, LabelInfo};
use gmail_classifiers::error::{HandlerError, Result};
use gmail_classifiers::handlers::MessageHandler;
use gmail_classifiers::models::{GmailMessage, LabelSpec, MessagePage};
use mockall::mock;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Create a test message with default values
pub fn create_test_message(id: &str, from: &str, subject: &str) -> GmailMessage {
    GmailMessage {
        id: id.to_string(),
        thread_id: format!("thread_{}", id),
        label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
        snippet: "Email snippet...".to_string(),
        history_id: None,
        internal_date: None,
        size_estimate: Some(1234),
        from: from.to_string(),
        to: vec!["me@example.com".to_string()],
        subject: subject.to_string(),
        date: Some("Mon, 1 Jan 2024 10:00:00 -0800".to_string()),
        body_text: Some("Thanks for riding with Uber".to_string()),
        attachments: vec![],
    }
}

/// Message fetched by id, as the mock provider returns it
pub fn message_for(id: &str) -> GmailMessage {
    create_test_message(id, "Uber Receipts <noreply@uber.com>", &format!("Trip {}", id))
}

/// One page of search results
pub fn page(ids: &[&str], next_page_token: Option<&str>) -> MessagePage {
    MessagePage {
        ids: ids.iter().map(|id| id.to_string()).collect(),
        next_page_token: next_page_token.map(|t| t.to_string()),
    }
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Handler that records `<name>:<message id>` for every invocation
///
/// Several recorders can share one log to check cross-classifier ordering.
pub struct RecordingHandler {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_on: HashSet<String>,
}

impl RecordingHandler {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log,
            fail_on: HashSet::new(),
        }
    }

    /// Return an error (after recording) for these message ids
    pub fn failing_on(mut self, ids: &[&str]) -> Self {
        self.fail_on = ids.iter().map(|id| id.to_string()).collect();
        self
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn invoke(&self, message: &GmailMessage) -> std::result::Result<(), HandlerError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, message.id));
        if self.fail_on.contains(&message.id) {
            return Err(HandlerError::failed(format!(
                "{} refused {}",
                self.name, message.id
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("record({})", self.name)
    }
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_page(&self, query: &str, page_token: Option<String>) -> Result<MessagePage>;
        async fn get_message(&self, id: &str) -> Result<GmailMessage>;
        async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>>;
        async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, spec: &LabelSpec) -> Result<String>;
        async fn modify_labels(
            &self,
            message_ids: &[String],
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<usize>;
        async fn trash_message(&self, id: &str) -> Result<()>;
        async fn untrash_message(&self, id: &str) -> Result<()>;
        async fn send_raw(&self, raw: Vec<u8>) -> Result<String>;
        async fn profile_email(&self) -> Result<String>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "test@example.com", "Test Subject");
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.thread_id, "thread_msg1");
        assert_eq!(msg.subject, "Test Subject");
    }

    #[test]
    fn test_page() {
        let p = page(&["m1", "m2"], Some("token123"));
        assert_eq!(p.ids, vec!["m1", "m2"]);
        assert_eq!(p.next_page_token.as_deref(), Some("token123"));
    }
}
