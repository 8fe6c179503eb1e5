//! Label setup: make sure configured labels exist and map names to ids
use std::collections::HashMap;
use tracing::{debug, info};

use crate::client::{GmailClient, LabelInfo};
use crate::error::{GmailError, Result};
use crate::models::LabelSpec;

/// Case-insensitive label name -> id lookup for one account
#[derive(Debug, Clone, Default)]
pub struct LabelDirectory {
    by_name: HashMap<String, LabelInfo>,
}

impl LabelDirectory {
    pub fn from_labels(labels: impl IntoIterator<Item = LabelInfo>) -> Self {
        let mut directory = Self::default();
        for label in labels {
            directory.insert(label);
        }
        directory
    }

    fn insert(&mut self, label: LabelInfo) {
        self.by_name.insert(label.name.to_lowercase(), label);
    }

    /// Label id for a name such as `INBOX` or `Receipts/Uber`
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|l| l.id.as_str())
    }

    /// Resolve every name, failing on the first unknown one
    pub fn resolve_all(&self, names: &[String]) -> Result<Vec<String>> {
        names
            .iter()
            .map(|name| {
                self.id_of(name).map(str::to_string).ok_or_else(|| {
                    GmailError::LabelError(format!(
                        "label '{}' does not exist and is not declared in [[labels]]",
                        name
                    ))
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// All labels sorted by name
    pub fn labels(&self) -> Vec<&LabelInfo> {
        let mut labels: Vec<_> = self.by_name.values().collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        labels
    }
}

/// Create any of `specs` missing from the account, parents first
///
/// Existing labels are matched case-insensitively and left untouched.
/// Returns the account's full label directory, new labels included.
pub async fn ensure_labels(client: &dyn GmailClient, specs: &[LabelSpec]) -> Result<LabelDirectory> {
    let mut directory = LabelDirectory::from_labels(client.list_labels().await?);
    debug!("Loaded {} existing labels", directory.len());

    let mut created = 0;
    for spec in specs {
        for parent in parent_names(&spec.name) {
            if directory.id_of(&parent).is_none() {
                let id = create(client, &LabelSpec::named(parent.clone())).await?;
                directory.insert(LabelInfo { id, name: parent });
                created += 1;
            }
        }

        if directory.id_of(&spec.name).is_some() {
            debug!("Label '{}' already exists", spec.name);
            continue;
        }
        let id = create(client, spec).await?;
        directory.insert(LabelInfo {
            id,
            name: spec.name.clone(),
        });
        created += 1;
    }

    if created > 0 {
        info!("Created {} label(s)", created);
    }
    Ok(directory)
}

/// Like [`ensure_labels`] but creates nothing
///
/// Declared labels missing from the account get a placeholder id of the form
/// `new:<name>`, enough to build and describe classifiers for a dry run.
pub async fn plan_labels(client: &dyn GmailClient, specs: &[LabelSpec]) -> Result<LabelDirectory> {
    let mut directory = LabelDirectory::from_labels(client.list_labels().await?);
    for spec in specs {
        for name in parent_names(&spec.name).into_iter().chain([spec.name.clone()]) {
            if directory.id_of(&name).is_none() {
                info!("Would create label: {}", name);
                directory.insert(LabelInfo {
                    id: format!("new:{}", name),
                    name,
                });
            }
        }
    }
    Ok(directory)
}

async fn create(client: &dyn GmailClient, spec: &LabelSpec) -> Result<String> {
    info!("Creating label: {}", spec.name);
    client.create_label(spec).await.map_err(|e| match e {
        GmailError::AuthError(_) => e,
        other => GmailError::LabelError(format!("failed to create label '{}': {}", spec.name, other)),
    })
}

/// `a/b/c` -> `["a", "a/b"]`
fn parent_names(name: &str) -> Vec<String> {
    let parts: Vec<&str> = name.split('/').collect();
    (1..parts.len()).map(|i| parts[..i].join("/")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(id: &str, name: &str) -> LabelInfo {
        LabelInfo {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_parent_names() {
        assert!(parent_names("Uber").is_empty());
        assert_eq!(parent_names("Finance/Cards/Visa"), vec!["Finance", "Finance/Cards"]);
    }

    #[test]
    fn test_directory_is_case_insensitive() {
        let directory = LabelDirectory::from_labels(vec![label("INBOX", "INBOX"), label("Label_1", "Uber")]);
        assert_eq!(directory.id_of("inbox"), Some("INBOX"));
        assert_eq!(directory.id_of(" uber "), Some("Label_1"));
        assert_eq!(directory.id_of("Missing"), None);
    }

    #[test]
    fn test_resolve_all_reports_unknown_label() {
        let directory = LabelDirectory::from_labels(vec![label("UNREAD", "UNREAD")]);
        assert_eq!(
            directory.resolve_all(&["UNREAD".to_string()]).unwrap(),
            vec!["UNREAD"]
        );
        let err = directory
            .resolve_all(&["UNREAD".to_string(), "Nope".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }
}
