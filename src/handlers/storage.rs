use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::MessageHandler;
use crate::client::GmailClient;
use crate::error::HandlerError;
use crate::models::{AttachmentRef, GmailMessage};

/// Characters that are unsafe in file names on common filesystems
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap());

/// Writes each message as pretty JSON to `<dir>/<message id>.json`
pub struct SaveJsonHandler {
    dir: PathBuf,
}

impl SaveJsonHandler {
    /// Creates the directory and its parents if missing
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MessageHandler for SaveJsonHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        let path = self.dir.join(format!("{}.json", sanitize(&message.id)));
        let json = serde_json::to_string_pretty(message)?;
        tokio::fs::write(&path, json).await?;
        debug!("Saved message {} to {:?}", message.id, path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("save_json({})", self.dir.display())
    }
}

/// Saves each message's attachments into a directory
///
/// Files are named `<stem>-<YYYY-MM-DD>.<ext>` using the message date.
pub struct DownloadAttachmentsHandler {
    client: Arc<dyn GmailClient>,
    dir: PathBuf,
    fail_if_exists: bool,
    extensions: Vec<String>,
}

impl DownloadAttachmentsHandler {
    /// Creates the directory and its parents if missing
    ///
    /// `extensions` restricts downloads to those file extensions (case-insensitive);
    /// empty means every attachment.
    pub fn new(
        client: Arc<dyn GmailClient>,
        dir: impl Into<PathBuf>,
        fail_if_exists: bool,
        extensions: Vec<String>,
    ) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            client,
            dir,
            fail_if_exists,
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    fn wants(&self, attachment: &AttachmentRef) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        attachment
            .extension()
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    async fn attachment_bytes(
        &self,
        message: &GmailMessage,
        attachment: &AttachmentRef,
    ) -> Result<Vec<u8>, HandlerError> {
        if let Some(data) = &attachment.inline_data {
            return Ok(data.clone());
        }
        let attachment_id = attachment.attachment_id.as_deref().ok_or_else(|| {
            HandlerError::failed(format!(
                "attachment {:?} of message {} has neither data nor an attachment id",
                attachment.filename, message.id
            ))
        })?;
        Ok(self.client.get_attachment(&message.id, attachment_id).await?)
    }
}

#[async_trait]
impl MessageHandler for DownloadAttachmentsHandler {
    async fn invoke(&self, message: &GmailMessage) -> Result<(), HandlerError> {
        let date = message.received_at().unwrap_or_else(Utc::now);

        for attachment in message.attachments.iter().filter(|a| self.wants(a)) {
            let path = self.dir.join(attachment_file_name(&attachment.filename, date));

            if self.fail_if_exists && tokio::fs::try_exists(&path).await? {
                return Err(HandlerError::failed(format!(
                    "file {} already exists",
                    path.display()
                )));
            }

            let data = self.attachment_bytes(message, attachment).await?;
            tokio::fs::write(&path, &data).await?;
            info!(
                "Saved attachment {:?} of message {} to {:?} ({} bytes)",
                attachment.filename,
                message.id,
                path,
                data.len()
            );
        }
        Ok(())
    }

    fn describe(&self) -> String {
        if self.extensions.is_empty() {
            format!("download_attachments({})", self.dir.display())
        } else {
            format!(
                "download_attachments({}, only {})",
                self.dir.display(),
                self.extensions.join("/")
            )
        }
    }
}

fn sanitize(name: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// File name for a saved attachment: `<stem>-<YYYY-MM-DD>.<ext>`
pub fn attachment_file_name(filename: &str, date: DateTime<Utc>) -> String {
    let filename = sanitize(filename);
    let day = date.format("%Y-%m-%d");
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}-{}.{}", stem, day, ext)
        }
        _ => format!("{}-{}", filename, day),
    }
}
