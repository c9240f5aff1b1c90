use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "resilience-cli")]
#[command(about = "Operator CLI for the serving-resilience service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, needed for reset and open
    #[arg(short, long, env = "RESILIENCE_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every circuit breaker's state and counters
    Breakers,
    /// Show breakers, tier usage and open circuits
    Stats,
    /// Show whether the service is degraded
    Health,
    /// Dump the Prometheus metrics text
    Metrics,
    /// Reset one circuit breaker to closed
    Reset { name: String },
    /// Reset every circuit breaker
    ResetAll,
    /// Force a circuit breaker open
    Open { name: String },
    /// Send a prompt through the fallback chain
    Generate {
        prompt: String,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())?);

    let mut admin_headers = headers.clone();
    admin_headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, body, headers) = match cli.command {
        Commands::Breakers => (Method::GET, "/circuit-breakers".to_string(), None, headers),
        Commands::Stats => (Method::GET, "/stats".to_string(), None, headers),
        Commands::Health => (Method::GET, "/health".to_string(), None, headers),
        Commands::Metrics => {
            let res = client.get(format!("{base}/metrics")).headers(headers).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if status.is_success() {
                print!("{text}");
            } else {
                eprintln!("Error: service returned status {status}");
                eprintln!("Response: {text}");
            }
            return Ok(());
        }
        Commands::Reset { name } => (
            Method::POST,
            format!("/admin/circuit-breakers/{name}/reset"),
            None,
            admin_headers,
        ),
        Commands::ResetAll => (
            Method::POST,
            "/admin/circuit-breakers/reset".to_string(),
            None,
            admin_headers,
        ),
        Commands::Open { name } => (
            Method::POST,
            format!("/admin/circuit-breakers/{name}/open"),
            None,
            admin_headers,
        ),
        Commands::Generate { prompt, max_tokens } => {
            let mut body = json!({ "prompt": prompt });
            if let Some(max_tokens) = max_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            (Method::POST, "/generate".to_string(), Some(body), headers)
        }
    };

    let mut request = client.request(method, format!("{base}{path}")).headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }
    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
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
