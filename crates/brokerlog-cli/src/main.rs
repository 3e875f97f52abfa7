//! brokerlog CLI - demo listeners with lifecycle logging
//!
//! Binds a set of tcp/tls/http/https endpoints, treats every accepted
//! connection as a broker client, and logs the whole lifecycle through the
//! adapter. Adapter records go to stdout; the CLI's own diagnostics go to
//! stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brokerlog::LogFormat;
use brokerlog_core::{classify, ListenerTraits};

mod config;
mod demo;

use config::DemoConfig;

/// brokerlog - structured lifecycle logging for MQTT brokers
#[derive(Parser)]
#[command(name = "brokerlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level for CLI diagnostics (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output CLI diagnostics as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run demo endpoints and log client lifecycles until Ctrl+C
    Demo {
        /// Bind address for every endpoint
        #[arg(short, long)]
        bind: Option<String>,

        /// Raw TCP port
        #[arg(long)]
        tcp_port: Option<u16>,

        /// TLS port
        #[arg(long)]
        tls_port: Option<u16>,

        /// HTTP (WebSocket) port
        #[arg(long)]
        http_port: Option<u16>,

        /// HTTPS (secure WebSocket) port
        #[arg(long)]
        https_port: Option<u16>,

        /// PEM certificate chain for the secure endpoints
        #[arg(long, requires = "key")]
        cert: Option<PathBuf>,

        /// PEM private key for the secure endpoints
        #[arg(long, requires = "cert")]
        key: Option<PathBuf>,

        /// Adapter minimum level or filter directive
        #[arg(long, env = "BROKERLOG_LEVEL")]
        level: Option<String>,

        /// Adapter output format (json, compact)
        #[arg(long)]
        format: Option<LogFormat>,

        /// Do not log PUBLISH packets
        #[arg(long)]
        no_messages: bool,
    },

    /// Print the protocol label for a listener trait combination
    Classify {
        /// Listener has TLS material
        #[arg(long)]
        tls: bool,

        /// Listener frames HTTP requests
        #[arg(long)]
        http: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Demo {
            bind,
            tcp_port,
            tls_port,
            http_port,
            https_port,
            cert,
            key,
            level,
            format,
            no_messages,
        } => {
            let mut config = match &cli.config {
                Some(path) => DemoConfig::from_file(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => DemoConfig::default(),
            };

            let endpoints = &mut config.endpoints;
            if let Some(bind) = bind {
                endpoints.bind = bind;
            }
            endpoints.tcp_port = tcp_port.or(endpoints.tcp_port);
            endpoints.tls_port = tls_port.or(endpoints.tls_port);
            endpoints.http_port = http_port.or(endpoints.http_port);
            endpoints.https_port = https_port.or(endpoints.https_port);
            if cert.is_some() {
                endpoints.cert = cert;
                endpoints.key = key;
            }

            if let Some(level) = level {
                config.logging.level = level;
            }
            if let Some(format) = format {
                config.logging.format = format;
            }
            if no_messages {
                config.logging.messages = false;
            }

            demo::run(config).await?;
        }

        Commands::Classify { tls, http } => {
            println!("{}", classify(ListenerTraits::new(tls, http)));
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .init();
    }

    Ok(())
}
