//! Sentinel entry point
//!
//! Serves the health, metrics and triage endpoints, or runs one of them
//! once from the command line.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sentinel_cli::{create_router, halt_on_terminal, App, Settings};
use sentinel_health::HeartbeatStatus;
use sentinel_trace::{init_logging, LogFormat, TraceRecorder};
use sentinel_triage::analyze_text_urgency;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Sentinel - resilience and observability core")]
#[command(version)]
struct Cli {
    /// Settings file (YAML, TOML or JSON)
    #[arg(short, long, global = true, env = "SENTINEL_SETTINGS")]
    settings: Option<PathBuf>,

    /// Log output format: json or pretty
    #[arg(long, global = true, default_value = "json", env = "SENTINEL_LOG_FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "SENTINEL_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Probe every configured component once and print the report
    Health,

    /// Score a message for urgency
    Triage {
        /// Message text
        text: String,

        /// Keyword to look for; repeat to pass several (default: configured set)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },

    /// Send one request through the bridge and print the response
    Request {
        /// Endpoint path relative to the bridge base URL
        endpoint: String,

        /// Tenant the call is made for
        #[arg(short, long, env = "SENTINEL_TENANT")]
        tenant: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "POST")]
        method: String,

        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        data: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format: LogFormat = cli.log_format.parse()?;
    init_logging(format)?;

    let recorder = TraceRecorder::default();
    let settings = match Settings::load_or_default(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            let message = e.to_string();
            halt_on_terminal(App::report_startup_fault(recorder, &message), &message)?;
            return Err(e.into());
        }
    };
    let app = Arc::new(App::bootstrap(settings, recorder)?);

    match cli.command {
        Commands::Serve { port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let router = create_router(app.clone());

            tracing::info!(
                %addr,
                environment = %app.environment,
                probes = ?app.orchestrator.probe_names(),
                "Starting Sentinel"
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Health => {
            let report = app.orchestrator.generate_global_health_report().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.status == HeartbeatStatus::Unreachable {
                std::process::exit(1);
            }
        }

        Commands::Triage { text, keywords } => {
            let keywords = if keywords.is_empty() {
                app.keywords.clone()
            } else {
                keywords
            };
            let report = analyze_text_urgency(&text, &keywords)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Request {
            endpoint,
            tenant,
            method,
            data,
        } => {
            let method: reqwest::Method = method
                .to_uppercase()
                .parse()
                .with_context(|| format!("invalid HTTP method '{}'", method))?;
            let payload: serde_json::Value =
                serde_json::from_str(&data).context("--data must be valid JSON")?;

            let response = app
                .bridge
                .request_with_method(&endpoint, &tenant, &payload, method)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
