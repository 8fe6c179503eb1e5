use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classifier::Classifier;
use crate::client::GmailClient;
use crate::error::{GmailError, HandlerError, Result};
use crate::handlers::{
    DownloadAttachmentsHandler, DryRunHandler, ForwardHandler, LabelHandler, MessageHandler,
    Pipeline, PrintHandler, SaveJsonHandler, TrashHandler, UntrashHandler,
};
use crate::labels::LabelDirectory;
use crate::models::LabelSpec;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub labels: Vec<LabelSpec>,
    #[serde(default)]
    pub classifiers: Vec<ClassifierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials")]
    pub credentials: PathBuf,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials(),
            token_cache: default_token_cache(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Retries for transient API failures; 0 disables retrying
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

/// One step of a classifier's pipeline, run in declared order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    Label {
        #[serde(default)]
        add: Vec<String>,
        #[serde(default)]
        remove: Vec<String>,
    },
    SaveJson {
        dir: PathBuf,
    },
    DownloadAttachments {
        dir: PathBuf,
        #[serde(default)]
        fail_if_exists: bool,
        #[serde(default)]
        extensions: Vec<String>,
    },
    Forward {
        to: Vec<String>,
    },
    Trash,
    Untrash,
    Print,
}

fn default_credentials() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from(".gmail-classifiers/token.json")
}

fn default_max_retries() -> u32 {
    3
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Check everything that can be checked without talking to Gmail
    pub fn validate(&self) -> Result<()> {
        if self.client.page_size == 0 || self.client.page_size > 500 {
            return Err(GmailError::ConfigError(
                "client.page_size must be between 1 and 500".to_string(),
            ));
        }
        if self.client.request_timeout_secs == 0 {
            return Err(GmailError::ConfigError(
                "client.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        for label in &self.labels {
            if label.name.trim().is_empty() {
                return Err(GmailError::ConfigError(
                    "labels entries need a non-empty name".to_string(),
                ));
            }
            if label.text_color.is_some() != label.background_color.is_some() {
                return Err(GmailError::ConfigError(format!(
                    "label '{}' must set both text_color and background_color, or neither",
                    label.name
                )));
            }
        }

        let mut names = HashSet::new();
        for classifier in &self.classifiers {
            let name = classifier.name.trim();
            if name.is_empty() {
                return Err(GmailError::ConfigError(
                    "classifier name cannot be empty".to_string(),
                ));
            }
            if !names.insert(name.to_string()) {
                return Err(GmailError::ConfigError(format!(
                    "duplicate classifier name '{}'",
                    name
                )));
            }
            if classifier.query.trim().is_empty() {
                return Err(GmailError::ConfigError(format!(
                    "classifier '{}' has an empty query",
                    name
                )));
            }
            if classifier.actions.is_empty() {
                return Err(GmailError::ConfigError(format!(
                    "classifier '{}' needs at least one action",
                    name
                )));
            }
            for action in &classifier.actions {
                action.validate(name)?;
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Label names referenced by any label action
    pub fn referenced_labels(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.classifiers
            .iter()
            .flat_map(|c| c.actions.iter())
            .flat_map(|a| match a {
                ActionConfig::Label { add, remove } => {
                    add.iter().chain(remove.iter()).collect::<Vec<&String>>()
                }
                _ => Vec::new(),
            })
            .map(String::as_str)
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect()
    }

    /// Build the runnable classifiers in declared order
    ///
    /// Label names are resolved against `labels`; an unknown name is a config error.
    /// With `dry_run` each pipeline is replaced by a handler that only logs it.
    pub async fn build_classifiers(
        &self,
        client: Arc<dyn GmailClient>,
        labels: &LabelDirectory,
        dry_run: bool,
    ) -> Result<Vec<Classifier>> {
        let mut classifiers = Vec::with_capacity(self.classifiers.len());
        for entry in &self.classifiers {
            let mut steps = Vec::with_capacity(entry.actions.len());
            for action in &entry.actions {
                let step = action
                    .build(Arc::clone(&client), labels)
                    .await
                    .map_err(|e| match e {
                        GmailError::AuthError(_) => e,
                        other => GmailError::ConfigError(format!(
                            "classifier '{}': {}",
                            entry.name.trim(),
                            other
                        )),
                    })?;
                steps.push(step);
            }

            let pipeline = Pipeline::new(steps);
            let handler: Arc<dyn MessageHandler> = if dry_run {
                Arc::new(DryRunHandler::new(&pipeline))
            } else {
                Arc::new(pipeline)
            };
            classifiers.push(Classifier::new(&entry.name, &entry.query, handler)?);
        }
        Ok(classifiers)
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        Self::example().save(path).await
    }

    fn example() -> Self {
        Self {
            labels: vec![LabelSpec {
                name: "Receipts".to_string(),
                text_color: Some("#ffffff".to_string()),
                background_color: Some("#16a766".to_string()),
            }],
            classifiers: vec![
                ClassifierConfig {
                    name: "Uber".to_string(),
                    query: "from:Uber".to_string(),
                    actions: vec![
                        ActionConfig::SaveJson {
                            dir: PathBuf::from("messages/uber"),
                        },
                        ActionConfig::Label {
                            add: vec!["Receipts".to_string()],
                            remove: vec!["INBOX".to_string()],
                        },
                    ],
                },
                ClassifierConfig {
                    name: "Card statement".to_string(),
                    query: "subject:\"Fatura\" has:attachment".to_string(),
                    actions: vec![ActionConfig::DownloadAttachments {
                        dir: PathBuf::from("attachments/statements"),
                        fail_if_exists: false,
                        extensions: vec!["pdf".to_string()],
                    }],
                },
            ],
            ..Self::default()
        }
    }
}

impl ActionConfig {
    fn validate(&self, classifier: &str) -> Result<()> {
        let problem = match self {
            ActionConfig::Label { add, remove } if add.is_empty() && remove.is_empty() => {
                Some("label action must add or remove at least one label")
            }
            ActionConfig::Label { add, remove }
                if add.iter().chain(remove.iter()).any(|l| l.trim().is_empty()) =>
            {
                Some("label action contains an empty label name")
            }
            ActionConfig::SaveJson { dir } | ActionConfig::DownloadAttachments { dir, .. }
                if dir.as_os_str().is_empty() =>
            {
                Some("dir cannot be empty")
            }
            ActionConfig::Forward { to } if to.is_empty() || to.iter().any(|a| a.trim().is_empty()) => {
                Some("forward action needs at least one non-empty address")
            }
            _ => None,
        };

        match problem {
            Some(reason) => Err(GmailError::ConfigError(format!(
                "classifier '{}': {}",
                classifier, reason
            ))),
            None => Ok(()),
        }
    }

    async fn build(
        &self,
        client: Arc<dyn GmailClient>,
        labels: &LabelDirectory,
    ) -> Result<Box<dyn MessageHandler>> {
        let handler: Box<dyn MessageHandler> = match self {
            ActionConfig::Label { add, remove } => {
                let description = format!("label(+[{}] -[{}])", add.join(", "), remove.join(", "));
                Box::new(
                    LabelHandler::new(client, labels.resolve_all(add)?, labels.resolve_all(remove)?)
                        .with_description(description),
                )
            }
            ActionConfig::SaveJson { dir } => Box::new(SaveJsonHandler::new(dir)?),
            ActionConfig::DownloadAttachments {
                dir,
                fail_if_exists,
                extensions,
            } => Box::new(DownloadAttachmentsHandler::new(
                client,
                dir,
                *fail_if_exists,
                extensions.clone(),
            )?),
            ActionConfig::Forward { to } => Box::new(
                ForwardHandler::from_account(client, to)
                    .await
                    .map_err(|e| match e {
                        HandlerError::Gmail(inner) => inner,
                        other => GmailError::ConfigError(other.to_string()),
                    })?,
            ),
            ActionConfig::Trash => Box::new(TrashHandler::new(client)),
            ActionConfig::Untrash => Box::new(UntrashHandler::new(client)),
            ActionConfig::Print => Box::new(PrintHandler::new()),
        };
        Ok(handler)
    }
}
