use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A full-format Gmail message as handed to classifier handlers
///
/// Built from the provider's response, never mutated by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub history_id: Option<u64>,
    pub internal_date: Option<DateTime<Utc>>,
    pub size_estimate: Option<i32>,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// Raw `Date` header value
    pub date: Option<String>,
    pub body_text: Option<String>,
    pub attachments: Vec<AttachmentRef>,
}

impl GmailMessage {
    /// When the message arrived, preferring Gmail's internal date over the header
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.internal_date.or_else(|| {
            self.date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|dt| dt.with_timezone(&Utc))
        })
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_ids.iter().any(|l| l == label_id)
    }
}

impl std::fmt::Display for GmailMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snippet: String = self.snippet.chars().take(25).collect();
        write!(
            f,
            "<GmailMessage id={} from={:?} subject={:?} snippet={:?}>",
            self.id, self.from, self.subject, snippet
        )
    }
}

/// Attachment descriptor found in a message payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentRef {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub part_id: Option<String>,
    /// Present when the body must be fetched separately
    pub attachment_id: Option<String>,
    /// Small attachments arrive inline with the message
    #[serde(skip)]
    pub inline_data: Option<Vec<u8>>,
}

impl AttachmentRef {
    /// Lowercased extension of the file name, if any
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// One page of a message search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// A user label to create on the account when missing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl LabelSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text_color: None,
            background_color: None,
        }
    }
}
