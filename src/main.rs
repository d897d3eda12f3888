//! resilient-client command line.
//!
//! ```text
//! resilient-client [--config FILE] [--endpoint URL]... call GET /users -q page=2
//! resilient-client --config client.toml serve
//! resilient-client pool-size --rps 200 --latency-ms 150
//! ```
//!
//! `serve` connects the client (starting health checks), exposes the admin
//! API and the Prometheus exporter, and runs until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hyper::Method;
use tokio::net::TcpListener;

use resilient_client::config::{load_config, ClientConfig, EndpointConfig};
use resilient_client::lifecycle::{forward_signals, Shutdown};
use resilient_client::net::ConnectionPoolSizer;
use resilient_client::observability::{init_logging, init_metrics};
use resilient_client::{admin, RequestSpec, ServiceClient};

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "Resilient HTTP client for replicated services", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra endpoint to register, on top of the configured ones.
    #[arg(short, long = "endpoint")]
    endpoints: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the client and print the result
    Call {
        method: String,
        path: String,
        /// Request body.
        #[arg(short, long)]
        data: Option<String>,
        /// Header as `name:value`. May be repeated.
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Query parameter as `key=value`. May be repeated.
        #[arg(short = 'q', long = "query")]
        params: Vec<String>,
    },
    /// Run health checks and the admin API until interrupted
    Serve,
    /// Print the recommended connection pool size
    PoolSize {
        #[arg(long)]
        rps: f64,
        #[arg(long)]
        latency_ms: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    config.endpoints.extend(cli.endpoints.iter().map(|url| EndpointConfig {
        url: url.clone(),
        weight: 1.0,
    }));

    init_logging(&config.observability);

    match cli.command {
        Commands::Call {
            method,
            path,
            data,
            headers,
            params,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut spec = RequestSpec::new(method, path);
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .ok_or_else(|| format!("header '{}' is not name:value", header))?;
                spec = spec.header(name.trim(), value.trim());
            }
            for param in &params {
                let (key, value) = param
                    .split_once('=')
                    .ok_or_else(|| format!("query '{}' is not key=value", param))?;
                spec = spec.param(key, value);
            }
            if let Some(data) = data {
                spec = spec.body(data);
            }

            let client = ServiceClient::new(config)?;
            let result = client.execute(spec).await;
            match result {
                Ok(response) => {
                    println!("{} ({} attempts, {:?})", response.status, response.attempts.len(), response.elapsed);
                    println!("{}", response.text());
                }
                Err(e) => eprintln!("Error: {}", e),
            }
            println!("{}", serde_json::to_string_pretty(&client.get_metrics())?);
        }
        Commands::Serve => serve(config).await?,
        Commands::PoolSize { rps, latency_ms } => {
            let sizer = ConnectionPoolSizer::from_config(&config.pool);
            let recommendation = sizer.recommend(rps, latency_ms / 1000.0);
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }
    }

    Ok(())
}

async fn serve(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-client starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let admin = config.admin.clone();
    let client = Arc::new(ServiceClient::new(config)?);
    client.connect();

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    let signals = forward_signals(shutdown.clone());

    if admin.enabled {
        let listener = TcpListener::bind(&admin.bind_address).await?;
        admin::serve(listener, client.clone(), &admin.api_key, stop).await?;
    } else {
        let _ = stop.recv().await;
    }

    signals.abort();
    client.disconnect().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
