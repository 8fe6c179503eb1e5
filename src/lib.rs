//! Gmail classifiers
//!
//! Runs named Gmail searches ("classifiers") and invokes a handler for every
//! message each search matches: label it, save it, download its attachments,
//! forward it, trash it, or anything implementing [`MessageHandler`].
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gmail_classifiers::{auth, Classifier, ClientSettings, Dispatcher, PrintHandler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = auth::authenticate(
//!         "credentials.json".as_ref(),
//!         ".gmail-classifiers/token.json".as_ref(),
//!         ClientSettings::default(),
//!     )
//!     .await?;
//!
//!     let uber = Classifier::new("Uber", "from:Uber", Arc::new(PrintHandler::new()))?;
//!     let report = Dispatcher::new(session.client()).run(&[uber]).await?;
//!     println!("handled {} message(s)", report.total_handled());
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 session with a persisted token
//! - [`client`] - Gmail API boundary with retry and timeouts
//! - [`classifier`] - name + query + handler
//! - [`dispatcher`] - runs classifiers and isolates failures
//! - [`handlers`] - built-in message handlers
//! - [`labels`] - label creation and name resolution
//! - [`config`] - TOML configuration
//! - [`cli`] - command-line interface
//! - [`error`] - error types and result aliases
//! - [`models`] - message and label data

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod labels;
pub mod models;

pub use error::{GmailError, HandlerError, Result};

pub use auth::{authenticate, Session};
pub use classifier::Classifier;
pub use client::{ClientSettings, GmailClient, LabelInfo, ProductionGmailClient};
pub use config::{ActionConfig, ClassifierConfig, Config};
pub use dispatcher::{ClassifierReport, DispatchReport, Dispatcher, RunOptions};
pub use handlers::{MessageHandler, Pipeline, PrintHandler};
pub use labels::{ensure_labels, LabelDirectory};
pub use models::{AttachmentRef, GmailMessage, LabelSpec, MessagePage};
