//! OAuth2 session management for the Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use yup_oauth2::ApplicationSecret;

use crate::client::{ClientSettings, ProductionGmailClient};
use crate::error::{GmailError, Result};

/// Read/write access to messages (no permanent deletion), including send
pub const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Label management
pub const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";

/// Scopes requested when the session is established
pub const REQUIRED_SCOPES: &[&str] = &[MODIFY_SCOPE, LABELS_SCOPE];

/// Environment variable naming the OAuth2 client-secret file
pub const CREDENTIALS_ENV_VAR: &str = "GMAIL_CREDENTIALS_PATH";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// An authenticated Gmail session
///
/// Owns the client handle for the lifetime of a run. The authenticator writes
/// the token cache whenever it obtains or refreshes a token; dropping the
/// session restricts the cache file to its owner on every exit path.
pub struct Session {
    client: Arc<ProductionGmailClient>,
    token_cache_path: PathBuf,
}

impl Session {
    pub fn new(client: ProductionGmailClient, token_cache_path: PathBuf) -> Self {
        Self {
            client: Arc::new(client),
            token_cache_path,
        }
    }

    /// Shared handle to the authenticated client
    pub fn client(&self) -> Arc<ProductionGmailClient> {
        Arc::clone(&self.client)
    }

    pub fn token_cache_path(&self) -> &Path {
        &self.token_cache_path
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.token_cache_path.exists() {
            return;
        }
        match secure_token_file(&self.token_cache_path) {
            Ok(()) => debug!("Secured token cache at {:?}", self.token_cache_path),
            Err(e) => warn!(
                "Could not restrict permissions on token cache {:?}: {}",
                self.token_cache_path, e
            ),
        }
    }
}

/// Establish an authenticated session
///
/// Runs the installed-app consent flow on first use (a local redirect listener
/// receives the authorization code), otherwise loads the cached token and
/// refreshes it when expired. A revoked refresh token falls back to the
/// consent flow.
///
/// # Arguments
/// * `credentials_path` - Path to the OAuth2 client-secret JSON file
/// * `token_cache_path` - Path where tokens are persisted
/// * `settings` - Retry and timeout settings for the returned client
pub async fn authenticate(
    credentials_path: &Path,
    token_cache_path: &Path,
    settings: ClientSettings,
) -> Result<Session> {
    let secret = load_credentials(credentials_path)
        .await
        .map_err(|e| GmailError::AuthError(format!("invalid credentials: {}", e)))?
        .application_secret()?;

    if let Some(parent) = token_cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let hub = initialize_gmail_hub(secret, token_cache_path).await?;
    info!("Authenticated with Gmail API (token cache: {:?})", token_cache_path);

    Ok(Session::new(
        ProductionGmailClient::new(hub, settings),
        token_cache_path.to_path_buf(),
    ))
}

/// Build the Gmail hub with a disk-persisted installed-flow authenticator
async fn initialize_gmail_hub(secret: ApplicationSecret, token_cache_path: &Path) -> Result<GmailHub> {
    // HTTPRedirect starts a local listener and prints the consent URL
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token for all scopes now so later calls never trigger a second consent
    auth.token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    // HTTP/1 works better with google-gmail1 than the HTTP/2 default
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| GmailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Google's OAuth2 client-secret JSON file
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<ClientSecret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<ClientSecret>,
}

/// Client id/secret block of the credentials file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Credentials {
    /// The client block, preferring the desktop-app (`installed`) entry
    pub fn client_secret(&self) -> Option<&ClientSecret> {
        self.installed.as_ref().or(self.web.as_ref())
    }

    /// Convert into the authenticator's secret, rejecting empty ids
    pub fn application_secret(&self) -> Result<ApplicationSecret> {
        let client = self.client_secret().ok_or_else(|| {
            GmailError::AuthError(
                "invalid credentials: no 'installed' or 'web' client entry".to_string(),
            )
        })?;

        if client.client_id.trim().is_empty() || client.client_secret.trim().is_empty() {
            return Err(GmailError::AuthError(
                "invalid credentials: client_id and client_secret must be set".to_string(),
            ));
        }

        Ok(ApplicationSecret {
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            project_id: client.project_id.clone(),
            auth_uri: client.auth_uri.clone(),
            token_uri: client.token_uri.clone(),
            redirect_uris: client.redirect_uris.clone(),
            ..Default::default()
        })
    }
}

/// Load OAuth2 credentials from a JSON file
pub async fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GmailError::ConfigError(format!("credentials file not found: {:?}", path))
        } else {
            GmailError::IoError(e)
        }
    })?;
    let creds = serde_json::from_str(&content)?;
    Ok(creds)
}

/// Pick the credentials file: explicit flag, then `GMAIL_CREDENTIALS_PATH`, then config
pub fn resolve_credentials_path(explicit: Option<&Path>, configured: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env::var(CREDENTIALS_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => configured.to_path_buf(),
    }
}

/// Remove a cached token so the next authentication runs the consent flow
pub async fn forget_token(token_cache_path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(token_cache_path).await {
        Ok(()) => {
            info!("Removed cached token {:?}", token_cache_path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
