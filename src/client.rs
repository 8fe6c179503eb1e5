//! Gmail API client: the provider boundary used by the dispatcher and handlers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::api::{
    BatchModifyMessagesRequest, Label, LabelColor, Message, MessagePart,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{GmailHub, LABELS_SCOPE, MODIFY_SCOPE};
use crate::config::ClientConfig;
use crate::error::{GmailError, Result};
use crate::models::{AttachmentRef, GmailMessage, LabelSpec, MessagePage};

/// Gmail accepts at most this many ids per batchModify call
const BATCH_MODIFY_LIMIT: usize = 1000;

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Operations the classifier runner needs from Gmail
///
/// Kept as a trait so the dispatcher and handlers can be driven by a mock.
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// One page of message ids matching a query; pass the previous page's token to continue
    async fn list_message_page(&self, query: &str, page_token: Option<String>)
        -> Result<MessagePage>;

    /// Fetch a message in full format
    async fn get_message(&self, id: &str) -> Result<GmailMessage>;

    /// Fetch the RFC 822 bytes of a message
    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>>;

    /// Download an attachment body
    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a label, returning its id
    async fn create_label(&self, spec: &LabelSpec) -> Result<String>;

    /// Add and remove labels on many messages (chunked at 1000 ids)
    /// Returns the number of messages modified
    async fn modify_labels(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<usize>;

    /// Move a message to trash
    async fn trash_message(&self, id: &str) -> Result<()>;

    /// Restore a message from trash
    async fn untrash_message(&self, id: &str) -> Result<()>;

    /// Send an already formatted RFC 822 message, returning the new message id
    async fn send_raw(&self, raw: Vec<u8>) -> Result<String>;

    /// Email address of the authenticated account
    async fn profile_email(&self) -> Result<String>;
}

/// Retry and timeout settings for [`ProductionGmailClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub max_retries: u32,
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            page_size: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ClientConfig> for ClientSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            page_size: config.page_size,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Gmail client over the `google-gmail1` hub
///
/// Every call is bounded by a timeout and transient failures
/// (429, 5xx, connection errors) are retried with exponential backoff.
pub struct ProductionGmailClient {
    hub: GmailHub,
    settings: ClientSettings,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub, settings: ClientSettings) -> Self {
        Self { hub, settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Check if an error is retryable
    fn should_retry(error: &GmailError) -> bool {
        error.is_transient()
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    let wait = match &e {
                        GmailError::RateLimitExceeded { retry_after } => {
                            std::cmp::max(delay, Duration::from_secs(*retry_after))
                        }
                        _ => delay,
                    };
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Await a hub call, mapping a timeout to a network error
    async fn timed<T, Fut>(&self, operation_name: &str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(GmailError::from),
            Err(_) => {
                warn!("Gmail API {} call timed out after {:?}", operation_name, timeout);
                Err(GmailError::NetworkError(format!(
                    "API call timed out after {:?}",
                    timeout
                )))
            }
        }
    }
}

/// Only a 400 on search means Gmail rejected the query itself
fn search_error(query: &str, error: GmailError) -> GmailError {
    match error {
        GmailError::BadRequest(reason) => GmailError::MalformedQuery {
            query: query.to_string(),
            reason,
        },
        other => other,
    }
}

/// Convert a full-format Gmail API message into our model
pub(crate) fn parse_message(msg: Message) -> Result<GmailMessage> {
    let id = msg
        .id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let thread_id = msg.thread_id.unwrap_or_default();

    let mut from = String::new();
    let mut subject = String::new();
    let mut to = Vec::new();
    let mut date = None;
    let mut body_text = None;
    let mut attachments = Vec::new();

    if let Some(payload) = msg.payload.as_ref() {
        for header in payload.headers.iter().flatten() {
            if let (Some(name), Some(value)) = (&header.name, &header.value) {
                match name.to_lowercase().as_str() {
                    "from" => from = value.clone(),
                    "subject" => subject = value.clone(),
                    "to" | "cc" => to.push(value.clone()),
                    "date" => date = Some(value.clone()),
                    _ => {}
                }
            }
        }
        collect_parts(payload, &mut body_text, &mut attachments);
    }

    let internal_date = msg.internal_date.and_then(DateTime::<Utc>::from_timestamp_millis);

    Ok(GmailMessage {
        id,
        thread_id,
        label_ids: msg.label_ids.unwrap_or_default(),
        snippet: msg.snippet.unwrap_or_default(),
        history_id: msg.history_id,
        internal_date,
        size_estimate: msg.size_estimate,
        from,
        to,
        subject,
        date,
        body_text,
        attachments,
    })
}

/// Walk a MIME tree collecting the first text/plain body and every named part
fn collect_parts(
    part: &MessagePart,
    body_text: &mut Option<String>,
    attachments: &mut Vec<AttachmentRef>,
) {
    let mime_type = part.mime_type.clone().unwrap_or_default();
    let filename = part.filename.clone().unwrap_or_default();
    let body = part.body.as_ref();

    if !filename.is_empty() {
        attachments.push(AttachmentRef {
            filename,
            mime_type,
            size: body.and_then(|b| b.size).unwrap_or(0).max(0) as u64,
            part_id: part.part_id.clone(),
            attachment_id: body.and_then(|b| b.attachment_id.clone()),
            inline_data: body.and_then(|b| b.data.clone()),
        });
    } else if mime_type == "text/plain" && body_text.is_none() {
        if let Some(data) = body.and_then(|b| b.data.as_ref()) {
            *body_text = Some(String::from_utf8_lossy(data).into_owned());
        }
    }

    for child in part.parts.iter().flatten() {
        collect_parts(child, body_text, attachments);
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_page(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        Self::with_retry("list_messages", self.settings.max_retries, || async {
            let mut call = self
                .hub
                .users()
                .messages_list("me")
                .q(query)
                .max_results(self.settings.page_size);

            if let Some(token) = page_token.as_deref() {
                call = call.page_token(token);
            }

            debug!("Listing messages for query {:?} (page token: {:?})", query, page_token);
            let (_, response) = self
                .timed("list_messages", call.add_scope(MODIFY_SCOPE).doit())
                .await?;

            let ids = response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id)
                .collect();

            Ok(MessagePage {
                ids,
                next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
            })
        })
        .await
        .map_err(|e| search_error(query, e))
    }

    async fn get_message(&self, id: &str) -> Result<GmailMessage> {
        Self::with_retry("get_message", self.settings.max_retries, || async {
            let call = self
                .hub
                .users()
                .messages_get("me", id)
                .format("full")
                .add_scope(MODIFY_SCOPE)
                .doit();
            let (_, msg) = self.timed("get_message", call).await?;
            parse_message(msg)
        })
        .await
    }

    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>> {
        Self::with_retry("get_raw_message", self.settings.max_retries, || async {
            let call = self
                .hub
                .users()
                .messages_get("me", id)
                .format("raw")
                .add_scope(MODIFY_SCOPE)
                .doit();
            let (_, msg) = self.timed("get_raw_message", call).await?;
            msg.raw.ok_or_else(|| {
                GmailError::InvalidMessageFormat(format!("Message {} has no raw content", id))
            })
        })
        .await
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        Self::with_retry("get_attachment", self.settings.max_retries, || async {
            let call = self
                .hub
                .users()
                .messages_attachments_get("me", message_id, attachment_id)
                .add_scope(MODIFY_SCOPE)
                .doit();
            let (_, body) = self.timed("get_attachment", call).await?;
            body.data.ok_or_else(|| {
                GmailError::InvalidMessageFormat(format!(
                    "Attachment {} of message {} has no data",
                    attachment_id, message_id
                ))
            })
        })
        .await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Self::with_retry("list_labels", self.settings.max_retries, || async {
            debug!("Calling Gmail API to list labels...");
            let call = self
                .hub
                .users()
                .labels_list("me")
                .add_scope(LABELS_SCOPE)
                .doit();
            let (_, response) = self.timed("list_labels", call).await?;

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Successfully parsed {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, spec: &LabelSpec) -> Result<String> {
        Self::with_retry("create_label", self.settings.max_retries, || async {
            let color = match (&spec.text_color, &spec.background_color) {
                (Some(text), Some(background)) => Some(LabelColor {
                    text_color: Some(text.clone()),
                    background_color: Some(background.clone()),
                }),
                _ => None,
            };
            let label = Label {
                name: Some(spec.name.clone()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                color,
                ..Default::default()
            };

            let call = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(LABELS_SCOPE)
                .doit();
            let (_, created_label) = self.timed("create_label", call).await?;

            created_label
                .id
                .ok_or_else(|| GmailError::LabelError("Created label has no ID".to_string()))
        })
        .await
    }

    async fn modify_labels(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<usize> {
        if message_ids.is_empty() || (add_label_ids.is_empty() && remove_label_ids.is_empty()) {
            return Ok(0);
        }

        let add_labels = (!add_label_ids.is_empty()).then(|| add_label_ids.to_vec());
        let remove_labels = (!remove_label_ids.is_empty()).then(|| remove_label_ids.to_vec());
        let mut total_modified = 0;

        for chunk in message_ids.chunks(BATCH_MODIFY_LIMIT) {
            Self::with_retry("modify_labels", self.settings.max_retries, || async {
                let request = BatchModifyMessagesRequest {
                    ids: Some(chunk.to_vec()),
                    add_label_ids: add_labels.clone(),
                    remove_label_ids: remove_labels.clone(),
                };

                let call = self
                    .hub
                    .users()
                    .messages_batch_modify(request, "me")
                    .add_scope(MODIFY_SCOPE)
                    .doit();
                self.timed("modify_labels", call).await?;
                Ok(())
            })
            .await?;

            total_modified += chunk.len();
        }

        Ok(total_modified)
    }

    async fn trash_message(&self, id: &str) -> Result<()> {
        Self::with_retry("trash_message", self.settings.max_retries, || async {
            let call = self
                .hub
                .users()
                .messages_trash("me", id)
                .add_scope(MODIFY_SCOPE)
                .doit();
            self.timed("trash_message", call).await?;
            Ok(())
        })
        .await
    }

    async fn untrash_message(&self, id: &str) -> Result<()> {
        Self::with_retry("untrash_message", self.settings.max_retries, || async {
            let call = self
                .hub
                .users()
                .messages_untrash("me", id)
                .add_scope(MODIFY_SCOPE)
                .doit();
            self.timed("untrash_message", call).await?;
            Ok(())
        })
        .await
    }

    async fn send_raw(&self, raw: Vec<u8>) -> Result<String> {
        let mime_type: mime::Mime = "message/rfc822"
            .parse()
            .map_err(|e| GmailError::Unknown(format!("Invalid mime type: {}", e)))?;

        // Sending is not idempotent, so it is never retried
        let call = self
            .hub
            .users()
            .messages_send(Message::default(), "me")
            .add_scope(MODIFY_SCOPE)
            .upload(std::io::Cursor::new(raw), mime_type);
        let (_, sent) = self.timed("send_message", call).await?;

        sent.id
            .ok_or_else(|| GmailError::ApiError("Sent message has no ID".to_string()))
    }

    async fn profile_email(&self) -> Result<String> {
        Self::with_retry("get_profile", self.settings.max_retries, || async {
            let call = self
                .hub
                .users()
                .get_profile("me")
                .add_scope(MODIFY_SCOPE)
                .doit();
            let (_, profile) = self.timed("get_profile", call).await?;
            profile
                .email_address
                .ok_or_else(|| GmailError::ApiError("Profile has no email address".to_string()))
        })
        .await
    }
}

// Implement GmailClient for Arc<C> to allow shared ownership
#[async_trait]
impl<C> GmailClient for Arc<C>
where
    C: GmailClient + ?Sized,
{
    async fn list_message_page(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        self.as_ref().list_message_page(query, page_token).await
    }

    async fn get_message(&self, id: &str) -> Result<GmailMessage> {
        self.as_ref().get_message(id).await
    }

    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>> {
        self.as_ref().get_raw_message(id).await
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        self.as_ref().get_attachment(message_id, attachment_id).await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        self.as_ref().list_labels().await
    }

    async fn create_label(&self, spec: &LabelSpec) -> Result<String> {
        self.as_ref().create_label(spec).await
    }

    async fn modify_labels(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<usize> {
        self.as_ref()
            .modify_labels(message_ids, add_label_ids, remove_label_ids)
            .await
    }

    async fn trash_message(&self, id: &str) -> Result<()> {
        self.as_ref().trash_message(id).await
    }

    async fn untrash_message(&self, id: &str) -> Result<()> {
        self.as_ref().untrash_message(id).await
    }

    async fn send_raw(&self, raw: Vec<u8>) -> Result<String> {
        self.as_ref().send_raw(raw).await
    }

    async fn profile_email(&self) -> Result<String> {
        self.as_ref().profile_email().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePartBody, MessagePartHeader};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn header(name: &str, value: &str) -> MessagePartHeader {
        MessagePartHeader {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn full_message() -> Message {
        Message {
            id: Some("m1".to_string()),
            thread_id: Some("t1".to_string()),
            label_ids: Some(vec!["INBOX".to_string(), "UNREAD".to_string()]),
            snippet: Some("Your invoice is attached".to_string()),
            internal_date: Some(1_704_124_800_000),
            payload: Some(MessagePart {
                mime_type: Some("multipart/mixed".to_string()),
                headers: Some(vec![
                    header("From", "Fatura Claro <fatura@claro.com.br>"),
                    header("To", "me@example.com"),
                    header("Subject", "Sua fatura chegou"),
                    header("Date", "Mon, 1 Jan 2024 16:00:00 +0000"),
                ]),
                parts: Some(vec![
                    MessagePart {
                        mime_type: Some("text/plain".to_string()),
                        filename: Some(String::new()),
                        body: Some(MessagePartBody {
                            data: Some(b"Hello there".to_vec()),
                            size: Some(11),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    MessagePart {
                        part_id: Some("1".to_string()),
                        mime_type: Some("application/pdf".to_string()),
                        filename: Some("fatura.pdf".to_string()),
                        body: Some(MessagePartBody {
                            attachment_id: Some("att-1".to_string()),
                            size: Some(2048),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_message_headers_body_and_attachments() {
        let msg = parse_message(full_message()).unwrap();

        assert_eq!(msg.id, "m1");
        assert_eq!(msg.thread_id, "t1");
        assert_eq!(msg.from, "Fatura Claro <fatura@claro.com.br>");
        assert_eq!(msg.subject, "Sua fatura chegou");
        assert_eq!(msg.to, vec!["me@example.com".to_string()]);
        assert_eq!(msg.body_text.as_deref(), Some("Hello there"));
        assert_eq!(
            msg.internal_date,
            DateTime::<Utc>::from_timestamp_millis(1_704_124_800_000)
        );

        assert_eq!(msg.attachments.len(), 1);
        let attachment = &msg.attachments[0];
        assert_eq!(attachment.filename, "fatura.pdf");
        assert_eq!(attachment.attachment_id.as_deref(), Some("att-1"));
        assert_eq!(attachment.size, 2048);
    }

    #[test]
    fn test_parse_message_requires_id() {
        let mut raw = full_message();
        raw.id = None;
        assert!(matches!(
            parse_message(raw),
            Err(GmailError::InvalidMessageFormat(_))
        ));
    }

    #[test]
    fn test_parse_message_without_payload() {
        let msg = parse_message(Message {
            id: Some("m2".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(msg.from.is_empty());
        assert!(msg.attachments.is_empty());
        assert!(msg.body_text.is_none());
    }

    #[test]
    fn test_should_retry() {
        assert!(ProductionGmailClient::should_retry(&GmailError::ServerError {
            status: 500,
            message: "Internal error".to_string(),
        }));
        assert!(ProductionGmailClient::should_retry(&GmailError::NetworkError(
            "connection reset".to_string()
        )));
        assert!(!ProductionGmailClient::should_retry(&GmailError::AuthError(
            "invalid token".to_string()
        )));
        assert!(!ProductionGmailClient::should_retry(&GmailError::MalformedQuery {
            query: "from:(".to_string(),
            reason: "HTTP 400".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_succeeds_after_transient_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempt_count);

        let result = ProductionGmailClient::with_retry("test_op", 3, || {
            let count = Arc::clone(&counter);
            async move {
                if count.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GmailError::NetworkError("Connection timeout".to_string()))
                } else {
                    Ok("success".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_fails_on_permanent_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempt_count);

        let result = ProductionGmailClient::with_retry("test_op", 3, || {
            let count = Arc::clone(&counter);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(GmailError::AuthError("Invalid credentials".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_exhausts_all_retries() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempt_count);

        let result = ProductionGmailClient::with_retry("test_op", 3, || {
            let count = Arc::clone(&counter);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(GmailError::RateLimitExceeded { retry_after: 1 })
            }
        })
        .await;

        assert!(result.is_err());
        // initial attempt + 3 retries
        assert_eq!(attempt_count.load(Ordering::SeqCst), 4);
    }

    fn json_failure(code: u16) -> GmailError {
        GmailError::from(google_gmail1::Error::BadRequest(serde_json::json!({
            "error": { "code": code, "message": "Request failed" }
        })))
    }

    #[test]
    fn test_search_error_only_treats_400_as_malformed_query() {
        assert!(matches!(
            search_error("from:(", json_failure(400)),
            GmailError::MalformedQuery { ref query, .. } if query == "from:("
        ));

        let rate_limited = search_error("from:Uber", json_failure(429));
        assert!(matches!(rate_limited, GmailError::RateLimitExceeded { .. }));
        assert!(rate_limited.is_transient());

        assert!(search_error("from:Uber", json_failure(401)).is_fatal());
        assert!(matches!(
            search_error("from:Uber", json_failure(503)),
            GmailError::ServerError { status: 503, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_retries_json_server_errors() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempt_count);

        let result = ProductionGmailClient::with_retry("get_message", 2, || {
            let count = Arc::clone(&counter);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(json_failure(503))
            }
        })
        .await;

        assert!(matches!(result, Err(GmailError::ServerError { status: 503, .. })));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_disabled() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempt_count);

        let result = ProductionGmailClient::with_retry("test_op", 0, || {
            let count = Arc::clone(&counter);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(GmailError::NetworkError("down".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_client_settings_from_config() {
        let config = ClientConfig {
            max_retries: 1,
            page_size: 50,
            request_timeout_secs: 10,
        };
        let settings = ClientSettings::from(&config);
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }
}
