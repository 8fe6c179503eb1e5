//! Runs classifiers against the mailbox and invokes their handlers
//!
//! Classifiers are processed in list order, matched messages in provider order,
//! strictly one at a time. Only an authentication failure ends a run early:
//! a rejected query skips its classifier, a failed fetch skips its message and
//! a failed handler is logged before moving on.

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::client::GmailClient;
use crate::error::{GmailError, Result};

/// Options for one dispatcher pass
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only consider messages received after this instant
    pub after: Option<DateTime<Utc>>,
}

/// Outcome of one classifier within a run
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ClassifierReport {
    pub name: String,
    pub query: String,
    /// Message ids returned by the search
    pub matched: usize,
    /// Handler returned Ok
    pub handled: usize,
    /// Handler returned an error
    pub failed: usize,
    /// Message could not be fetched
    pub skipped: usize,
    /// Set when the whole classifier was skipped
    pub skip_reason: Option<String>,
}

impl ClassifierReport {
    fn new(classifier: &Classifier, query: String) -> Self {
        Self {
            name: classifier.name().to_string(),
            query,
            ..Self::default()
        }
    }
}

/// Summary of a dispatcher run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub classifiers: Vec<ClassifierReport>,
}

impl DispatchReport {
    pub fn total_matched(&self) -> usize {
        self.classifiers.iter().map(|c| c.matched).sum()
    }

    pub fn total_handled(&self) -> usize {
        self.classifiers.iter().map(|c| c.handled).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.classifiers.iter().map(|c| c.failed).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.classifiers.iter().map(|c| c.skipped).sum()
    }

    pub fn skipped_classifiers(&self) -> impl Iterator<Item = &ClassifierReport> {
        self.classifiers.iter().filter(|c| c.skip_reason.is_some())
    }

    /// True when every matched message was handled
    pub fn is_clean(&self) -> bool {
        self.total_failed() == 0
            && self.total_skipped() == 0
            && self.skipped_classifiers().next().is_none()
    }
}

/// Stateless classifier runner over a Gmail client
///
/// Each call to [`Dispatcher::run`] is an independent pass; nothing is
/// remembered between passes, so re-running re-invokes handlers.
pub struct Dispatcher {
    client: Arc<dyn GmailClient>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self { client }
    }

    pub async fn run(&self, classifiers: &[Classifier]) -> Result<DispatchReport> {
        self.run_with(classifiers, &RunOptions::default()).await
    }

    pub async fn run_with(
        &self,
        classifiers: &[Classifier],
        options: &RunOptions,
    ) -> Result<DispatchReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("dispatch", %run_id);

        async {
            info!("Running {} classifier(s)", classifiers.len());
            let mut reports = Vec::with_capacity(classifiers.len());

            for classifier in classifiers {
                let span = info_span!("classifier", name = %classifier.name());
                let report = self
                    .run_classifier(classifier, options)
                    .instrument(span)
                    .await?;
                reports.push(report);
            }

            let report = DispatchReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                classifiers: reports,
            };
            info!(
                "Run finished: {} matched, {} handled, {} failed, {} skipped",
                report.total_matched(),
                report.total_handled(),
                report.total_failed(),
                report.total_skipped()
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run_classifier(
        &self,
        classifier: &Classifier,
        options: &RunOptions,
    ) -> Result<ClassifierReport> {
        let query = classifier.search_query(options.after);
        let mut report = ClassifierReport::new(classifier, query.clone());

        // Read every page first so handlers that relabel or trash cannot shift later pages
        let ids = match self.matching_ids(&query).try_collect::<Vec<_>>().await {
            Ok(ids) => ids,
            Err(e) if e.is_fatal() => return Err(e),
            Err(GmailError::MalformedQuery { query, reason }) => {
                error!("Query {:?} rejected by Gmail, skipping classifier: {}", query, reason);
                report.skip_reason = Some(format!("malformed query: {}", reason));
                return Ok(report);
            }
            Err(e) => {
                warn!("Search failed, skipping classifier: {}", e);
                report.skip_reason = Some(e.to_string());
                return Ok(report);
            }
        };

        report.matched = ids.len();
        info!("{} message(s) match {:?}", ids.len(), query);

        for id in ids {
            let message = match self.client.get_message(&id).await {
                Ok(message) => message,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping message {}: {}", id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            match classifier.handler().invoke(&message).await {
                Ok(()) => {
                    debug!("Handled message {}", id);
                    report.handled += 1;
                }
                Err(source) => {
                    let failure = GmailError::HandlerFailed {
                        classifier: classifier.name().to_string(),
                        message_id: id,
                        source: Box::new(source),
                    };
                    error!("{}", failure);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Lazily follow pagination, yielding each matching id once
    fn matching_ids<'a>(&'a self, query: &'a str) -> impl Stream<Item = Result<String>> + 'a {
        try_stream! {
            let mut seen = HashSet::new();
            let mut page_token: Option<String> = None;
            loop {
                let page = self.client.list_message_page(query, page_token.take()).await?;
                debug!("Got page of {} id(s)", page.ids.len());
                for id in page.ids {
                    if seen.insert(id.clone()) {
                        yield id;
                    }
                }
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }
    }
}
