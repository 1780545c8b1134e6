//! dldata CLI
//!
//! Command-line interface for the Digital Lawyer analytics dashboard.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use dldata::api::{AppState, HttpServer};
use dldata::auth::{hash_password, session_cleanup_loop, CredentialStore, SessionStore};
use dldata::config::LoggingConfig;
use dldata::db::InteractionRepository;
use dldata::Config;

/// dldata - Digital Lawyer interaction analytics
#[derive(Parser)]
#[command(name = "dldata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "DLDATA_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard web server
    Serve {
        /// Host to bind to (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// HTTP port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate configuration, credentials and database access
    Check,

    /// Print a bcrypt hash for the credential store
    HashPassword {
        /// Password to hash (prompted when omitted)
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();

    let result = match command {
        Commands::Serve { host, port } => match load_config(config.as_deref(), verbose) {
            Ok(config) => run_serve(config, host, port).await,
            Err(e) => Err(e),
        },
        Commands::Check => match load_config(config.as_deref(), verbose) {
            Ok(config) => run_check(config).await,
            Err(e) => Err(e),
        },
        Commands::HashPassword { password } => {
            init_logging(&LoggingConfig::default(), verbose);
            run_hash_password(password)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration and start logging as it describes
fn load_config(path: Option<&str>, verbose: bool) -> anyhow::Result<Config> {
    let config = Config::load(path).context("Error loading configuration")?;
    init_logging(&config.logging, verbose);
    Ok(config)
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_credentials(config: &Config) -> anyhow::Result<CredentialStore> {
    let path = &config.auth.credentials_path;
    CredentialStore::load(path)
        .with_context(|| format!("failed to load credential store {}", path.display()))
}

async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = config;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let credentials = load_credentials(&config)?;
    info!(
        users = credentials.credentials.usernames.len(),
        cookie = %credentials.cookie.name,
        "Loaded credential store"
    );

    let sessions = Arc::new(SessionStore::new(
        &credentials.cookie,
        config.dashboard.default_date_from,
        config.auth.secure_cookies,
    ));
    tokio::spawn(session_cleanup_loop(
        Arc::clone(&sessions),
        Duration::from_secs(config.auth.session_sweep_interval_secs),
    ));

    let repository = InteractionRepository::new(&config.database);
    info!(
        host = %config.database.host,
        database = %config.database.name,
        "Using PostgreSQL interaction source"
    );

    let state = AppState {
        source: Arc::new(repository),
        credentials: Arc::new(credentials),
        sessions,
        dashboard: config.dashboard.clone(),
    };

    HttpServer::new(state).serve(&config.bind_addr()).await?;
    Ok(())
}

async fn run_check(config: Config) -> anyhow::Result<()> {
    println!("Configuration: ok ({})", config.bind_addr());

    let credentials = load_credentials(&config)?;
    println!(
        "Credentials:   ok ({} users, cookie '{}')",
        credentials.credentials.usernames.len(),
        credentials.cookie.name
    );

    InteractionRepository::new(&config.database)
        .health_check()
        .await
        .context("database check failed")?;
    println!(
        "Database:      ok ({}@{}/{})",
        config.database.user, config.database.host, config.database.name
    );

    Ok(())
}

fn run_hash_password(password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()?,
    };

    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }

    println!("{}", hash_password(&password)?);
    Ok(())
}
