//! Stand-in model server for trying the service locally.
//!
//! ```text
//! cargo run --example mock_backend -- --port 9001 --name primary
//! cargo run --example mock_backend -- --port 9002 --name secondary --delay-ms 8000
//! ```

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Clone)]
struct Args {
    #[arg(long, default_value_t = 9001)]
    port: u16,

    /// Name echoed in every completion
    #[arg(long, default_value = "mock")]
    name: String,

    /// Delay before answering, to exercise breaker timeouts
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Answer every request with 503
    #[arg(long)]
    fail: bool,
}

#[derive(Deserialize)]
struct Prompt {
    prompt: String,
}

async fn generate(
    State(args): State<Arc<Args>>,
    Json(request): Json<Prompt>,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    if args.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }
    if args.fail {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "model overloaded"));
    }
    Ok(Json(json!({ "text": format!("[{}] {}", args.name, request.prompt) })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Arc::new(Args::parse());
    let app = Router::new()
        .route("/generate", post(generate))
        .with_state(args.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    println!("Mock model '{}' listening on http://{}/generate", args.name, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
