//! Process entry point: wires the store, budget governor, oracle and job
//! handlers into a `WorkerPool` and runs it until a shutdown signal
//! arrives (spec.md §4.6).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mira_budget::{BudgetLimits, CostGovernor, PricingTable};
use mira_extractor::{EmbeddingFn, LearningExtractor};
use mira_queue::JobQueue;
use mira_store::{Store, StoreConfig};
use mira_telemetry::Logger;
use mira_types::{JobType, LlmOracle};
use mira_worker::{ExtractionHandler, PublishHandler, ValidationHandler, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Long-running executor for `ai_sanitization_validation`, `extract_learning`
/// and `publish_learning` jobs.
#[derive(Parser, Debug)]
#[command(name = "mira-worker", version)]
struct Args {
    /// Lease duration in seconds for ai_sanitization_validation claims.
    #[arg(long, env = "MIRA_VALIDATION_LEASE_SECONDS", default_value_t = 60)]
    validation_lease_seconds: u64,
    /// Concurrent ai_sanitization_validation handlers.
    #[arg(long, env = "MIRA_VALIDATION_CONCURRENCY", default_value_t = 2)]
    validation_concurrency: usize,

    /// Lease duration in seconds for extract_learning claims.
    #[arg(long, env = "MIRA_EXTRACTION_LEASE_SECONDS", default_value_t = 120)]
    extraction_lease_seconds: u64,
    /// Concurrent extract_learning handlers.
    #[arg(long, env = "MIRA_EXTRACTION_CONCURRENCY", default_value_t = 2)]
    extraction_concurrency: usize,

    /// Lease duration in seconds for publish_learning claims.
    #[arg(long, env = "MIRA_PUBLISH_LEASE_SECONDS", default_value_t = 60)]
    publish_lease_seconds: u64,
    /// Concurrent publish_learning handlers.
    #[arg(long, env = "MIRA_PUBLISH_CONCURRENCY", default_value_t = 1)]
    publish_concurrency: usize,

    /// Daily LLM spend cap in integer cents.
    #[arg(long, env = "MIRA_DAILY_LIMIT_CENTS", default_value_t = 5_000)]
    daily_limit_cents: i64,
    /// Monthly LLM spend cap in integer cents.
    #[arg(long, env = "MIRA_MONTHLY_LIMIT_CENTS", default_value_t = 100_000)]
    monthly_limit_cents: i64,
    /// Per-call LLM spend cap in integer cents.
    #[arg(long, env = "MIRA_PER_OPERATION_LIMIT_CENTS", default_value_t = 500)]
    per_operation_limit_cents: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Store::connect(&StoreConfig::from_env()).await?;

    let budget = CostGovernor::new(
        store.clone(),
        PricingTable::default_table(),
        BudgetLimits {
            daily_limit_cents: args.daily_limit_cents,
            monthly_limit_cents: args.monthly_limit_cents,
            per_operation_limit_cents: args.per_operation_limit_cents,
        },
    );
    budget.reset_if_period_rolled(chrono::Utc::now()).await?;

    let oracle = build_oracle()?;
    let model = oracle_model_name();

    let (log_writer, log_loop) = Logger::spawn(store.clone());
    let shutdown = CancellationToken::new();

    let mut pool = WorkerPool::new(JobQueue::new(store.clone()));

    let validator = mira_validator::AiValidator::new(store.clone(), oracle.clone(), budget.clone_for_validator(), &model);
    pool.register(
        JobType::AiSanitizationValidation,
        Arc::new(ValidationHandler::new(validator)),
        args.validation_lease_seconds,
        args.validation_concurrency,
    );

    let extractor = LearningExtractor::new(store.clone(), oracle.clone(), budget.clone_for_extractor(), embedding_fn(), &model);
    pool.register(
        JobType::ExtractLearning,
        Arc::new(ExtractionHandler::new(extractor)),
        args.extraction_lease_seconds,
        args.extraction_concurrency,
    );

    pool.register(
        JobType::PublishLearning,
        Arc::new(PublishHandler::new(store.clone())),
        args.publish_lease_seconds,
        args.publish_concurrency,
    );

    let retention_token = shutdown.clone();
    let retention_store = store.clone();
    tokio::spawn(async move { run_retention_loop(retention_store, retention_token).await });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
        }
        info!("shutdown signal received");
        signal_token.cancel();
    });

    info!("mira-worker starting");
    pool.run(shutdown.clone()).await;
    shutdown.cancel();
    log_loop.run(shutdown).await;
    let _ = log_writer;

    Ok(())
}

#[cfg(feature = "http-oracle")]
fn build_oracle() -> anyhow::Result<Arc<dyn LlmOracle>> {
    let oracle = mira_worker::HttpOracle::from_env().map_err(anyhow::Error::msg)?;
    Ok(Arc::new(oracle))
}

#[cfg(not(feature = "http-oracle"))]
fn build_oracle() -> anyhow::Result<Arc<dyn LlmOracle>> {
    anyhow::bail!("mira-worker was built without the http-oracle feature and no other LlmOracle is wired in")
}

fn oracle_model_name() -> String {
    std::env::var("MIRA_ORACLE_MODEL").unwrap_or_else(|_| "gemini-3-pro".to_string())
}

/// No embedding model is bundled; operators inject a real one by building
/// against a fork of this function. A content-hash fallback keeps dedup
/// meaningful (identical text dedupes) without pulling in a model runtime.
fn embedding_fn() -> EmbeddingFn {
    Arc::new(|text: &str| {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(text.as_bytes());
        digest.iter().take(32).map(|b| *b as f32 / 255.0).collect()
    })
}

async fn run_retention_loop(store: Store, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(6 * 60 * 60));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match mira_telemetry::prune_logs(&store).await {
                    Ok(deleted) if deleted > 0 => info!(deleted, "pruned expired telemetry logs"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "log retention pass failed"),
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}
