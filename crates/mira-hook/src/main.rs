//! Process entry point: stdin in, store out, always exit 0 (spec.md §4.4).

use std::time::Instant;

use mira_hook::{handle_event, log_latency_breach, DEADLINE_P95, MAX_EVENT_BYTES};
use mira_store::{Store, StoreConfig};
use mira_telemetry::CorrelationContext;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let ctx = CorrelationContext::root();
    let started = Instant::now();

    let outcome = run(&ctx).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(()) => println!("ack"),
        Err(reason) => error!(correlation_id = %ctx.correlation_id, %reason, "hook invocation failed"),
    }

    if elapsed > DEADLINE_P95 {
        warn!(correlation_id = %ctx.correlation_id, duration_ms = elapsed.as_millis() as u64, "hook latency deadline breached");
        if let Ok(store) = Store::connect(&StoreConfig::from_env()).await {
            log_latency_breach(&store, &ctx, elapsed.as_millis() as u64).await;
        }
    }

    std::process::exit(0);
}

async fn run(ctx: &CorrelationContext) -> Result<(), String> {
    let raw = read_bounded_stdin().await.map_err(|e| format!("read error: {e}"))?;
    let store = Store::connect(&StoreConfig::from_env())
        .await
        .map_err(|e| format!("store unavailable: {e}"))?;
    handle_event(&store, ctx, &raw).await
}

async fn read_bounded_stdin() -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut stdin = tokio::io::stdin();
    let mut buf = Vec::new();
    let mut limited = (&mut stdin).take(MAX_EVENT_BYTES as u64 + 1);
    limited.read_to_end(&mut buf).await?;

    if buf.len() as u64 > MAX_EVENT_BYTES as u64 {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "event payload exceeds 1 MiB"));
    }
    Ok(buf)
}
