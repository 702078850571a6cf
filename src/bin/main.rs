//! Crashlog CLI - record and upload crash logs
//!
//! Drains a crash log directory to the upload endpoint, records crash logs
//! by hand, and lists what is pending.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use crashlog::{
    CrashLogConfig, DeletePolicy, ExceptionKindPolicy, HttpTransport, LogDirectory, LogFileState,
    LogUploader, LogWriter, StaticPlatform,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crashlog")]
#[command(about = "Record crash logs and upload them to a HockeyApp-compatible endpoint")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every pending crash log, then remove it
    Upload {
        #[command(flatten)]
        settings: Settings,

        /// Keep logs on disk until the server acknowledges them
        #[arg(long)]
        delete_after_ack: bool,
    },

    /// Write one crash log
    Record {
        #[command(flatten)]
        settings: Settings,

        /// Crash message
        #[arg(short, long)]
        message: String,

        /// File containing the stack trace (or - for stdin)
        #[arg(short, long)]
        stack: Option<String>,
    },

    /// List pending crash logs (stray files are removed)
    Pending {
        #[command(flatten)]
        settings: Settings,

        /// Output format: pretty or json
        #[arg(short, long, default_value = "pretty")]
        format: OutputFormat,
    },
}

/// Settings shared by every command. Flags override the config file.
#[derive(Args)]
struct Settings {
    /// TOML config file
    #[arg(short, long, env = "CRASHLOG_CONFIG")]
    config: Option<PathBuf>,

    /// App identifier
    #[arg(long, env = "CRASHLOG_APP_ID")]
    app_id: Option<String>,

    /// Package identifier
    #[arg(long, env = "CRASHLOG_PACKAGE_ID")]
    package_id: Option<String>,

    /// Storage directory; logs live in its logs/ subdirectory
    #[arg(long, env = "CRASHLOG_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Upload API base URL
    #[arg(long, env = "CRASHLOG_BASE_URL")]
    base_url: Option<String>,

    /// App version written to the Version header
    #[arg(long)]
    app_version: Option<String>,

    /// Platform string, e.g. "Android OS 13 / API-33"
    #[arg(long, default_value = "")]
    os: String,

    /// Device model
    #[arg(long, default_value = "")]
    model: String,

    /// Accept subclassed exception kinds
    #[arg(long)]
    any_exception: bool,
}

impl Settings {
    fn resolve(&self) -> Result<CrashLogConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => CrashLogConfig::load(path)?,
            None => CrashLogConfig::default(),
        };

        if let Some(app_id) = &self.app_id {
            config.app_id = app_id.clone();
        }
        if let Some(package_id) = &self.package_id {
            config.package_id = package_id.clone();
        }
        if let Some(storage_dir) = &self.storage_dir {
            config.storage_dir = storage_dir.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if self.any_exception {
            config.exception_kinds = ExceptionKindPolicy::AnyException;
        }
        Ok(config)
    }

    fn platform(&self) -> Arc<StaticPlatform> {
        Arc::new(StaticPlatform::new(
            self.app_version.clone(),
            self.os.clone(),
            self.model.clone(),
        ))
    }
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crashlog=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            settings,
            delete_after_ack,
        } => {
            upload(&settings, delete_after_ack).await?;
        }
        Commands::Record {
            settings,
            message,
            stack,
        } => {
            record(&settings, &message, stack.as_deref())?;
        }
        Commands::Pending { settings, format } => {
            pending(&settings, format)?;
        }
    }

    Ok(())
}

async fn upload(
    settings: &Settings,
    delete_after_ack: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = settings.resolve()?;
    if delete_after_ack {
        config.delete_policy = DeletePolicy::AfterAck;
    }
    config.validate()?;

    let uploader = LogUploader::new(
        LogDirectory::new(config.log_dir()),
        &config.base_url,
        &config.app_id,
        config.package_id.clone(),
        settings.platform(),
        Arc::new(HttpTransport::new()),
    )
    .with_max_upload_bytes(config.max_upload_bytes)
    .with_delete_policy(config.delete_policy);

    println!("{} {}", "Uploading to".cyan(), uploader.url());
    let summary = uploader.run().await?;

    for record in &summary.records {
        let name = record
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let status = record
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        if record.delivered() {
            println!("  {} {} ({})", "✓".green(), name, status);
        } else {
            println!("  {} {} ({})", "✗".red(), name, status);
        }
        if record.state == LogFileState::Pending {
            println!("    {}", "kept for the next run".dimmed());
        }
    }

    println!(
        "{} {} delivered, {} failed, {} kept",
        "Done:".green().bold(),
        summary.delivered(),
        summary.failed(),
        summary.retained()
    );
    Ok(())
}

fn record(
    settings: &Settings,
    message: &str,
    stack: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.resolve()?;

    let stack_trace = match stack {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };

    let dir = LogDirectory::new(config.log_dir());
    dir.ensure()?;
    let writer = LogWriter::new(dir.path(), config.package_id.clone(), settings.platform());
    let path = writer.write(message, &stack_trace)?;

    println!("{} {}", "Recorded".green(), path.display());
    Ok(())
}

fn pending(settings: &Settings, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.resolve()?;
    let logs = LogDirectory::new(config.log_dir()).scan_pending()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
        OutputFormat::Pretty => {
            if logs.is_empty() {
                println!("{}", "No pending crash logs".dimmed());
                return Ok(());
            }
            println!("{} {}", logs.len().to_string().bold(), "pending crash log(s):");
            for log in &logs {
                println!("  {} {}", log.path.display(), format!("{} bytes", log.size).dimmed());
            }
        }
    }
    Ok(())
}
