//! Classifiers: a named Gmail query bound to the handler that runs on each match

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::error::{GmailError, Result};
use crate::handlers::MessageHandler;

/// "If a message matches this query, invoke this handler"
///
/// Immutable once built. The query is never interpreted locally; Gmail
/// evaluates it and rejects malformed ones at request time.
#[derive(Clone)]
pub struct Classifier {
    name: String,
    query: String,
    handler: Arc<dyn MessageHandler>,
}

impl Classifier {
    /// Build a classifier, trimming surrounding whitespace from name and query
    ///
    /// Fails when either is empty.
    pub fn new(
        name: impl Into<String>,
        query: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let query = query.into().trim().to_string();

        if name.is_empty() {
            return Err(GmailError::InvalidClassifier(
                "classifier name cannot be empty".to_string(),
            ));
        }
        if query.is_empty() {
            return Err(GmailError::InvalidClassifier(format!(
                "classifier '{}' has an empty query",
                name
            )));
        }

        Ok(Self {
            name,
            query,
            handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn handler(&self) -> &Arc<dyn MessageHandler> {
        &self.handler
    }

    /// The query sent to Gmail, optionally restricted to messages after `after`
    pub fn search_query(&self, after: Option<DateTime<Utc>>) -> String {
        match after {
            Some(ts) => format!("{} after:{}", self.query, ts.timestamp()),
            None => self.query.clone(),
        }
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("name", &self.name)
            .field("query", &self.query)
            .field("handler", &self.handler.describe())
            .finish()
    }
}
