use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "client-admin")]
#[command(about = "Management CLI for a running resilient-client", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "CLIENT_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check client status
    Status,
    /// View request, cache and retry metrics
    Metrics,
    /// List endpoint health and connections
    Endpoints,
    /// Probe the service through the client
    Health,
    /// View the connection pool recommendation
    Pool,
    /// Register an endpoint
    Add {
        endpoint: String,
        #[arg(short, long, default_value_t = 1.0)]
        weight: f64,
    },
    /// Deregister an endpoint
    Remove { endpoint: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let endpoints = format!("{}/admin/endpoints", cli.url);
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Metrics => client.get(format!("{}/admin/metrics", cli.url)),
        Commands::Endpoints => client.get(endpoints),
        Commands::Health => client.get(format!("{}/admin/health", cli.url)),
        Commands::Pool => client.get(format!("{}/admin/pool", cli.url)),
        Commands::Add { endpoint, weight } => client
            .post(endpoints)
            .json(&serde_json::json!({ "url": endpoint, "weight": weight })),
        Commands::Remove { endpoint } => client.delete(endpoints).query(&[("url", endpoint)]),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }
    if status == reqwest::StatusCode::NO_CONTENT {
        println!("OK");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
