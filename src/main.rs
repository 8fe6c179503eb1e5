use anyhow::Result;
use clap::Parser;
use gmail_classifiers::cli::{self, Cli, Commands};
use gmail_classifiers::error::GmailError;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        if matches!(e.downcast_ref::<GmailError>(), Some(GmailError::AuthError(_))) {
            eprintln!(
                "\nCheck the credentials file (--credentials or GMAIL_CREDENTIALS_PATH), \
                 then run: gmail-classifiers auth --force"
            );
        } else {
            eprintln!("\nFor help, run: gmail-classifiers --help");
        }
        process::exit(1);
    }
}

/// Install the subscriber once; every component only uses the tracing macros
fn init_logging(cli: &Cli, multi: Arc<MultiProgress>) {
    let default_filter = if cli.verbose {
        "gmail_classifiers=debug,info"
    } else {
        "gmail_classifiers=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter { multi })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick one crypto provider per platform
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let multi_progress = Arc::new(MultiProgress::new());
    init_logging(&cli, Arc::clone(&multi_progress));

    match &cli.command {
        Commands::Auth { force } => {
            cli::authenticate(&cli, *force, (*multi_progress).clone()).await
        }

        Commands::Run {
            dry_run,
            since_hours,
            json,
        } => {
            if *dry_run {
                println!("Running in DRY RUN mode - no changes will be made");
            }
            let report =
                cli::run_once(&cli, *dry_run, *since_hours, (*multi_progress).clone()).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                cli::print_report(&report);
            }
            Ok(())
        }

        Commands::Watch {
            interval,
            since_hours,
            dry_run,
        } => {
            cli::watch(
                &cli,
                *interval,
                *since_hours,
                *dry_run,
                (*multi_progress).clone(),
            )
            .await
        }

        Commands::Labels => cli::show_labels(&cli, (*multi_progress).clone()).await,

        Commands::Check => cli::check(&cli).await,

        Commands::InitConfig { output, force } => cli::init_config(output, *force).await,
    }
}
