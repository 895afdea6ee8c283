//! prediction-form: fill the prediction service's form from the terminal.
//!
//! Usage:
//!   prediction-form params
//!   prediction-form predict --field age=30 --field "city=New York"
//!   prediction-form tui
//!   prediction-form serve-stub --value 42

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use prediction_form::config::{Config, ConfigSource};
use prediction_form::service::{self, ConstantPredictor, ServiceState};
use prediction_form::{FormSession, HttpPredictionClient, PredictionApi, SubmitOutcome, tui};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prediction-form")]
#[command(about = "Schema-driven client for a prediction service", long_about = None)]
struct Cli {
    /// Prediction service base URL (overrides config and PREDICT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print the parameter schema
    Params,
    /// Fill the form from NAME=VALUE pairs and submit it
    Predict {
        /// Field value, repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Interactive form
    Tui,
    /// Run a stub prediction service with a fixed answer
    ServeStub {
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Value every prediction returns
        #[arg(long)]
        value: Option<f64>,
    },
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("field name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Where log lines go. The TUI owns the terminal, so it never gets stderr.
#[derive(Debug, PartialEq, Eq)]
enum LogSink {
    Stderr,
    File(PathBuf),
    Disabled,
}

fn log_sink(config: &Config, tui: bool) -> LogSink {
    match (&config.runtime.log_file, tui) {
        (Some(path), _) => LogSink::File(path.clone()),
        (None, true) => LogSink::Disabled,
        (None, false) => LogSink::Stderr,
    }
}

fn init_tracing(config: &Config, sink: LogSink) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.runtime.log_level));
    match sink {
        LogSink::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogSink::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        LogSink::Disabled => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
        config.validate()?;
    }
    init_tracing(&config, log_sink(&config, matches!(cli.command, Commands::Tui)))?;
    match &config.source {
        ConfigSource::File(path) => debug!("Loaded config from {}", path.display()),
        ConfigSource::Defaults(path) => {
            warn!("Config file {} not found, using defaults", path.display())
        }
    }

    match cli.command {
        Commands::Params => params(&config).await,
        Commands::Predict { fields } => predict(&config, fields).await,
        Commands::Tui => run_tui(&config).await,
        Commands::ServeStub { bind, value } => serve_stub(&config, bind, value).await,
    }
}

async fn params(config: &Config) -> Result<()> {
    let client = HttpPredictionClient::new(&config.api)?;
    let schema = client.fetch_params().await?;
    for (name, field_type) in schema.fields() {
        println!("{name}\t{field_type}");
    }
    Ok(())
}

async fn predict(config: &Config, fields: Vec<(String, String)>) -> Result<()> {
    let client = HttpPredictionClient::new(&config.api)?;
    let mut session = FormSession::load(&client).await?;
    for (name, value) in fields {
        session.form_mut().set_value(&name, value)?;
    }

    match session.submit(&client).await? {
        SubmitOutcome::Predicted(prediction) => {
            println!("{prediction}");
            Ok(())
        }
        SubmitOutcome::Invalid(missing) => {
            bail!("missing required fields: {}", missing.join(", "))
        }
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    let api: Arc<dyn PredictionApi> = Arc::new(HttpPredictionClient::new(&config.api)?);
    let handle = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || tui::run(api, handle)).await?
}

async fn serve_stub(config: &Config, bind: Option<SocketAddr>, value: Option<f64>) -> Result<()> {
    let addr = bind.unwrap_or(config.stub.bind);
    let value = value.unwrap_or(config.stub.prediction);
    info!("Stub predictions fixed at {}", value);
    let state = ServiceState::new(service::default_schema(), ConstantPredictor(value));
    service::bind_and_serve(addr, state).await?;
    Ok(())
}
