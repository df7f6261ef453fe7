//! gavel - bulk judicial data synchronization

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gavel::{
    config::{Args, SyncTarget},
    courtlistener::{ClientConfig, CourtDataSource, CourtListenerClient},
    orchestrator::{BulkImportOrchestrator, PhaseSpec, RunState},
    ratelimit::RateLimiter,
    report,
    store::{MemoryStore, PostgrestConfig, PostgrestStore, SyncStore},
    sync::{CourtSync, DecisionSync, JudgeDetailSync, JudgeSync, Phase, SyncOptions},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gavel={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  gavel - judicial data sync");
    info!("======================================");
    info!("Run ID: {}", args.run_id);
    info!("Target: {:?}", args.entity);
    info!("CourtListener: {}", args.courtlistener_url);
    info!(
        "Store: {}",
        if args.offline {
            "in-memory (offline)"
        } else {
            "supabase"
        }
    );
    if let Some(j) = &args.jurisdiction {
        info!("Jurisdiction: {}", j);
    }
    info!(
        "Batches: courts/judges {}, details {}, decisions {}",
        args.court_batch(),
        args.detail_batch(),
        args.decision_batch()
    );
    info!(
        "Quota: {} requests per {}s window",
        args.rate_limit, args.rate_window_secs
    );
    info!("======================================");

    let limiter = Arc::new(RateLimiter::new(args.rate_limit, args.rate_window_secs));

    let source: Arc<dyn CourtDataSource> = Arc::new(CourtListenerClient::new(
        ClientConfig {
            base_url: args.courtlistener_url.clone(),
            token: args.courtlistener_token.clone(),
            timeout_ms: args.request_timeout_ms,
        },
        Arc::clone(&limiter),
    )?);

    let store: Arc<dyn SyncStore> = if args.offline {
        Arc::new(MemoryStore::new())
    } else {
        let url = args
            .supabase_url
            .clone()
            .context("SUPABASE_URL is required")?;
        let key = args
            .supabase_key
            .clone()
            .context("SUPABASE_SERVICE_ROLE_KEY is required")?;
        Arc::new(PostgrestStore::new(PostgrestConfig {
            url,
            key,
            timeout_ms: args.request_timeout_ms,
        })?)
    };

    if args.status_only {
        let counts = store.counts().await?;
        println!(
            "Store: {} courts, {} judges, {} decisions",
            counts.courts, counts.judges, counts.decisions
        );
        report::print_usage(&limiter.usage_stats());
        return Ok(());
    }

    let orchestrator = build_orchestrator(&args, source, store, Arc::clone(&limiter));

    // In-flight batch writes are not rolled back on interrupt; upserts are
    // idempotent per record, so a re-run picks up cleanly.
    tokio::select! {
        run_report = orchestrator.run() => {
            report::print_summary(&run_report, &limiter.usage_stats());
            if !matches!(run_report.state, RunState::Done) {
                std::process::exit(1);
            }
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; current batch may be partially applied");
            report::print_usage(&limiter.usage_stats());
            std::process::exit(1)
        }
    }
}

/// Wire the selected phases into an orchestrator
fn build_orchestrator(
    args: &Args,
    source: Arc<dyn CourtDataSource>,
    store: Arc<dyn SyncStore>,
    limiter: Arc<RateLimiter>,
) -> BulkImportOrchestrator {
    let options = |batch_size: u32| SyncOptions {
        jurisdiction: args.jurisdiction.clone(),
        batch_size,
        force_refresh: args.force_refresh,
        staleness_days: args.staleness_days,
    };

    let wants = |target: SyncTarget| args.entity == SyncTarget::All || args.entity == target;
    let mut orchestrator = BulkImportOrchestrator::new(args.run_id, limiter);

    if wants(SyncTarget::Courts) {
        let batch = args.court_batch();
        orchestrator = orchestrator.register(
            PhaseSpec::defaults_for(Phase::Courts, batch),
            Arc::new(CourtSync::new(
                Arc::clone(&source),
                Arc::clone(&store),
                options(batch),
            )),
        );
    }
    if wants(SyncTarget::Judges) {
        let batch = args.judge_batch();
        orchestrator = orchestrator.register(
            PhaseSpec::defaults_for(Phase::Judges, batch),
            Arc::new(JudgeSync::new(
                Arc::clone(&source),
                Arc::clone(&store),
                options(batch),
            )),
        );
    }
    if wants(SyncTarget::JudgeDetails) {
        let batch = args.detail_batch();
        orchestrator = orchestrator.register(
            PhaseSpec::defaults_for(Phase::JudgeDetails, batch),
            Arc::new(JudgeDetailSync::new(
                Arc::clone(&source),
                Arc::clone(&store),
                options(batch),
            )),
        );
    }
    if wants(SyncTarget::Decisions) {
        let batch = args.decision_batch();
        orchestrator = orchestrator.register(
            PhaseSpec::defaults_for(Phase::Decisions, batch),
            Arc::new(DecisionSync::new(source, store, options(batch))),
        );
    }

    orchestrator
}
