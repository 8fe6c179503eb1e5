//! Command-line interface

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use futures::FutureExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{self, Session};
use crate::classifier::Classifier;
use crate::client::{ClientSettings, GmailClient};
use crate::config::Config;
use crate::dispatcher::{DispatchReport, Dispatcher, RunOptions};
use crate::error::GmailError;
use crate::labels;

#[derive(Parser, Debug)]
#[command(name = "gmail-classifiers")]
#[command(version)]
#[command(about = "Run Gmail search classifiers and act on every match", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file (overrides GMAIL_CREDENTIALS_PATH and the config)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Path to token cache file (overrides the config)
    #[arg(long)]
    pub token_cache: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Run every classifier once
    Run {
        /// Log what each classifier would do without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Only consider messages received in the last N hours
        #[arg(long)]
        since_hours: Option<u64>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run classifiers repeatedly, each pass only looking at newer messages
    Watch {
        /// Seconds between passes
        #[arg(short, long, default_value_t = 60)]
        interval: u64,

        /// Bound the first pass to the last N hours
        #[arg(long)]
        since_hours: Option<u64>,

        /// Log what each classifier would do without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Create declared labels and list the account's labels
    Labels,

    /// Validate the configuration without contacting Gmail
    Check,

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn credentials_path(&self, config: &Config) -> PathBuf {
        auth::resolve_credentials_path(self.credentials.as_deref(), &config.auth.credentials)
    }

    pub fn token_cache_path(&self, config: &Config) -> PathBuf {
        self.token_cache
            .clone()
            .unwrap_or_else(|| config.auth.token_cache.clone())
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    /// Share an existing MultiProgress so log lines print above spinners
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }
}

async fn open_session(cli: &Cli, config: &Config, reporter: &ProgressReporter) -> Result<Session> {
    let spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let session = auth::authenticate(
        &cli.credentials_path(config),
        &cli.token_cache_path(config),
        ClientSettings::from(&config.client),
    )
    .await;
    match session {
        Ok(session) => {
            reporter.finish_spinner(&spinner, "Gmail API authenticated");
            Ok(session)
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

/// Ensure labels exist (or plan them for a dry run) and build the classifiers
async fn prepare_classifiers(
    config: &Config,
    client: Arc<dyn GmailClient>,
    dry_run: bool,
    reporter: &ProgressReporter,
) -> Result<Vec<Classifier>> {
    let spinner = reporter.add_spinner("Preparing labels and classifiers...");
    let directory = if dry_run {
        labels::plan_labels(client.as_ref(), &config.labels).await?
    } else {
        labels::ensure_labels(client.as_ref(), &config.labels).await?
    };
    let classifiers = config.build_classifiers(client, &directory, dry_run).await?;
    reporter.finish_spinner(
        &spinner,
        &format!(
            "{} classifier(s) ready ({} labels on account)",
            classifiers.len(),
            directory.len()
        ),
    );
    Ok(classifiers)
}

/// Lower bound `hours` before now, rejecting spans chrono cannot represent
fn since(hours: Option<u64>) -> std::result::Result<Option<DateTime<Utc>>, GmailError> {
    let Some(hours) = hours else {
        return Ok(None);
    };
    i64::try_from(hours)
        .ok()
        .and_then(ChronoDuration::try_hours)
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .map(Some)
        .ok_or_else(|| {
            GmailError::ConfigError(format!("--since-hours {} is out of range", hours))
        })
}

/// `auth`: run the consent flow if needed and show the connected account
pub async fn authenticate(cli: &Cli, force: bool, multi: MultiProgress) -> Result<()> {
    let config = Config::load(&cli.config).await?;
    let token_cache = cli.token_cache_path(&config);

    if force && auth::forget_token(&token_cache).await? {
        info!("Removed existing token cache");
    }

    let reporter = ProgressReporter::with_multi_progress(multi);
    let session = open_session(cli, &config, &reporter).await?;
    let email = session.client().profile_email().await?;

    println!("Successfully authenticated with Gmail API");
    println!("Token cached at: {:?}", session.token_cache_path());
    println!("Connected to account: {}", email);
    Ok(())
}

/// `run`: one dispatcher pass over every configured classifier
pub async fn run_once(
    cli: &Cli,
    dry_run: bool,
    since_hours: Option<u64>,
    multi: MultiProgress,
) -> Result<DispatchReport> {
    let reporter = ProgressReporter::with_multi_progress(multi);

    let config = Config::load(&cli.config).await?;
    if config.classifiers.is_empty() {
        warn!("No classifiers configured in {:?}", cli.config);
    }

    let session = open_session(cli, &config, &reporter).await?;
    let client: Arc<dyn GmailClient> = session.client();
    let classifiers = prepare_classifiers(&config, Arc::clone(&client), dry_run, &reporter).await?;

    let options = RunOptions {
        after: since(since_hours)?,
    };
    let report = Dispatcher::new(client).run_with(&classifiers, &options).await?;
    Ok(report)
}

/// `watch`: repeated passes until Ctrl-C
///
/// Each pass is bounded to messages received after the previous pass started.
pub async fn watch(
    cli: &Cli,
    interval: u64,
    since_hours: Option<u64>,
    dry_run: bool,
    multi: MultiProgress,
) -> Result<()> {
    if interval == 0 {
        return Err(GmailError::ConfigError("--interval must be at least 1 second".to_string()).into());
    }
    let reporter = ProgressReporter::with_multi_progress(multi);

    let config = Config::load(&cli.config).await?;
    let session = open_session(cli, &config, &reporter).await?;
    let client: Arc<dyn GmailClient> = session.client();
    let classifiers = prepare_classifiers(&config, Arc::clone(&client), dry_run, &reporter).await?;
    let dispatcher = Dispatcher::new(client);

    let after = Cell::new(since(since_hours)?);
    let (dispatcher, classifiers, after) = (&dispatcher, &classifiers, &after);

    info!("Watching every {}s, press Ctrl-C to stop", interval);
    repeat_until(
        Duration::from_secs(interval),
        tokio::signal::ctrl_c(),
        move || async move {
            let pass_started = Utc::now();
            let report = dispatcher
                .run_with(classifiers, &RunOptions { after: after.get() })
                .await?;
            if report.total_matched() > 0 || !report.is_clean() {
                print_report(&report);
            }
            after.set(Some(pass_started));
            Ok::<(), anyhow::Error>(())
        },
    )
    .await?;
    info!("Stopping watch");
    Ok(())
}

/// Run `pass` every `interval` until `shutdown` resolves
///
/// A pass already in progress finishes before the loop stops.
async fn repeat_until<S, F, Fut>(interval: Duration, shutdown: S, mut pass: F) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::pin!(shutdown);

    // ctrl_c() installs its handler on first poll, which must happen before the first pass
    if let Some(result) = (&mut shutdown).now_or_never() {
        result.context("Failed to listen for Ctrl-C")?;
        return Ok(());
    }

    loop {
        pass().await?;

        tokio::select! {
            biased;
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// `labels`: ensure declared labels and list everything on the account
pub async fn show_labels(cli: &Cli, multi: MultiProgress) -> Result<()> {
    let reporter = ProgressReporter::with_multi_progress(multi);
    let config = Config::load(&cli.config).await?;
    let session = open_session(cli, &config, &reporter).await?;

    let directory = labels::ensure_labels(session.client().as_ref(), &config.labels).await?;
    println!("\n{:<40} ID", "NAME");
    for label in directory.labels() {
        println!("{:<40} {}", label.name, label.id);
    }
    Ok(())
}

/// `check`: validate the config and report what would run
pub async fn check(cli: &Cli) -> Result<()> {
    if !cli.config.exists() {
        return Err(GmailError::ConfigError(format!(
            "Configuration file not found at {:?}. Run init-config to create one.",
            cli.config
        ))
        .into());
    }
    let config = Config::load(&cli.config).await?;

    let credentials = cli.credentials_path(&config);
    if credentials.exists() {
        auth::load_credentials(&credentials).await?.application_secret()?;
        println!("Credentials: {:?} (ok)", credentials);
    } else {
        println!("Credentials: {:?} (missing)", credentials);
    }
    println!("Token cache: {:?}", cli.token_cache_path(&config));

    for label in &config.labels {
        println!("Label: {}", label.name);
    }
    for classifier in &config.classifiers {
        println!(
            "Classifier {:?}: {} ({} action(s))",
            classifier.name.trim(),
            classifier.query.trim(),
            classifier.actions.len()
        );
    }
    let unknown: Vec<&str> = config
        .referenced_labels()
        .into_iter()
        .filter(|name| !config.labels.iter().any(|l| l.name.eq_ignore_ascii_case(name)))
        .collect();
    if !unknown.is_empty() {
        println!(
            "Labels expected to exist already on the account: {}",
            unknown.join(", ")
        );
    }
    println!("Configuration OK");
    Ok(())
}

/// `init-config`: write an example configuration
pub async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(GmailError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        ))
        .into());
    }

    Config::create_example(output).await?;
    println!("Created example configuration file at: {:?}", output);
    println!("\nEdit the [[classifiers]] entries to match your mail.");
    Ok(())
}

pub fn print_report(report: &DispatchReport) {
    println!("\n========================================");
    println!("Run Summary");
    println!("========================================");
    println!("Run ID: {}", report.run_id);
    println!(
        "Duration: {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
    for classifier in &report.classifiers {
        match &classifier.skip_reason {
            Some(reason) => println!("  {:<24} skipped: {}", classifier.name, reason),
            None => println!(
                "  {:<24} matched {:>4}  handled {:>4}  failed {:>3}  unreadable {:>3}",
                classifier.name,
                classifier.matched,
                classifier.handled,
                classifier.failed,
                classifier.skipped
            ),
        }
    }
    println!("========================================");
}
