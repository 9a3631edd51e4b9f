use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use deal_core::{CompletionModel, Currency, FeedSource, PriceEstimator, SimilarityIndex};
use deal_memory::Memory;
use deal_planner::{
    CycleRunner, DealPlanner, InsightGenerator, PlannerConfig, RunEvent, RunHandle, TriggerError,
};
use deal_scanner::{DealScanner, HttpFeedSource, HttpPageFetcher, ScannerConfig};
use model_client::ModelClients;
use notification_service::NotificationService;
use pricing_ensemble::{
    CurrencyConverter, EnsembleConfig, FrontierEstimator, NeighborAverageEstimator,
    PricingEnsemble, SpecialistEstimator,
};
use tokio::signal::unix::SignalKind;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

mod config;
mod metrics;

use config::AgentConfig;
use metrics::AgentMetrics;

/// Everything a spawned cycle driver needs besides its handle.
#[derive(Clone)]
struct CycleContext {
    metrics: Arc<Mutex<AgentMetrics>>,
    insights: Arc<InsightGenerator>,
    memory: Arc<Memory>,
    insights_count: usize,
    symbol: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting Deal Hunter agent");

    // 2. Configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Scan interval: {} seconds", config.scan_interval_seconds);
    tracing::info!("  Feeds: {}", config.feeds.len());
    tracing::info!("  Alert threshold: {:.2} (working currency)", config.alert_threshold);
    tracing::info!("  Completion model: {}", config.model.completion_model);
    tracing::info!("  Memory: {}", config.memory_path.display());

    // 3. Model services
    let clients = ModelClients::new(&config.model)?;
    tracing::info!(
        "Completion backend: {:?} at {}",
        clients.completion.backend(),
        config.model.completion_endpoint
    );
    match clients.specialist.health().await {
        Ok(true) => tracing::info!("Specialist pricing service healthy"),
        Ok(false) => tracing::warn!("Specialist pricing service reports unhealthy; it will abstain"),
        Err(e) => tracing::warn!("Specialist pricing service unreachable ({}); it will abstain", e),
    }

    let completion: Arc<dyn CompletionModel> = Arc::new(clients.completion.clone());
    let similarity: Arc<dyn SimilarityIndex> = Arc::new(clients.similarity.clone());

    // 4. Scanner
    let page_timeout = Duration::from_secs(config.page_timeout_seconds);
    let mut feeds: Vec<Arc<dyn FeedSource>> = Vec::with_capacity(config.feeds.len());
    for url in &config.feeds {
        feeds.push(Arc::new(HttpFeedSource::new(url.clone(), page_timeout)?));
    }
    let scanner = DealScanner::new(
        feeds,
        Arc::new(HttpPageFetcher::new(page_timeout)?),
        completion.clone(),
        ScannerConfig {
            entries_per_source: config.entries_per_source,
            deals_per_scan: config.deals_per_scan,
            fetch_delay: Duration::from_millis(config.fetch_delay_ms),
            completion_timeout: Duration::from_secs(config.selection_timeout_seconds),
        },
    );

    // 5. Pricing ensemble
    let estimators: Vec<Arc<dyn PriceEstimator>> = vec![
        Arc::new(FrontierEstimator::new(completion.clone(), similarity.clone()))
            as Arc<dyn PriceEstimator>,
        Arc::new(SpecialistEstimator::new(
            clients.specialist.clone(),
            config.specialist_currency,
        )),
        Arc::new(NeighborAverageEstimator::new(similarity)),
    ];
    let converter = CurrencyConverter::default().with_rate(Currency::Usd, config.usd_to_inr);
    let ensemble = PricingEnsemble::new(
        estimators,
        converter,
        EnsembleConfig {
            estimator_timeout: Duration::from_secs(config.estimator_timeout_seconds),
            ..EnsembleConfig::default()
        },
    );
    let currency = ensemble.working_currency();
    let symbol = currency.symbol();

    // 6. Memory and alerts
    let memory = Arc::new(Memory::load(config.memory_path.clone()).await?);
    tracing::info!("Loaded {} remembered opportunities", memory.len());

    let notifications = NotificationService::new(&config.notifications).with_currency(currency);
    if notifications.channel_count() == 0 {
        tracing::warn!("No alert channels configured; alerts will only be logged");
    }

    // 7. Planner
    let planner = DealPlanner::new(
        Arc::new(scanner),
        Arc::new(ensemble),
        Arc::new(notifications),
        memory.clone(),
        PlannerConfig {
            deals_per_scan: config.deals_per_scan,
            alert_threshold: config.alert_threshold,
        },
    );
    let runner = CycleRunner::new(Arc::new(planner));

    let context = CycleContext {
        metrics: Arc::new(Mutex::new(AgentMetrics::new(config.metrics_log_interval_cycles))),
        insights: Arc::new(InsightGenerator::new(completion)),
        memory,
        insights_count: config.insights_count,
        symbol,
    };

    tracing::info!(
        "Deal agent running. Scan interval: {}s | Send SIGUSR1 for an immediate scan",
        config.scan_interval_seconds
    );

    // Main loop with graceful shutdown (SIGINT + SIGTERM). The first tick fires immediately.
    let mut interval = time::interval(Duration::from_secs(config.scan_interval_seconds));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let mut sigusr1 = tokio::signal::unix::signal(SignalKind::user_defined1())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut driver: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                trigger_cycle(&runner, &context, &shutdown_rx, &mut driver).await;
            }
            _ = sigusr1.recv() => {
                tracing::info!("Manual scan requested");
                trigger_cycle(&runner, &context, &shutdown_rx, &mut driver).await;
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down deal agent...");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(driver) = driver.take() {
        if let Err(e) = driver.await {
            tracing::warn!("Cycle driver ended abnormally: {}", e);
        }
    }

    context.metrics.lock().await.log_metrics();
    tracing::info!("Deal agent stopped");
    Ok(())
}

/// Start a cycle unless one is already in flight.
async fn trigger_cycle(
    runner: &CycleRunner,
    context: &CycleContext,
    shutdown: &watch::Receiver<bool>,
    driver: &mut Option<JoinHandle<()>>,
) {
    match runner.start() {
        Ok(handle) => {
            *driver = Some(tokio::spawn(drive_cycle(
                handle,
                context.clone(),
                shutdown.clone(),
            )));
        }
        Err(TriggerError::Busy) => {
            tracing::info!("Planning cycle still running, skipping this trigger");
            context.metrics.lock().await.record_skipped();
        }
    }
}

/// Relay one cycle's progress into the agent log and record its outcome.
async fn drive_cycle(mut handle: RunHandle, context: CycleContext, mut shutdown: watch::Receiver<bool>) {
    let cycle_start = AgentMetrics::start_timer();
    let mut report = None;

    loop {
        let next = tokio::select! {
            event = handle.next_event() => Some(event),
            _ = shutdown.changed() => None,
        };
        match next {
            Some(Some(RunEvent::Log(line))) => tracing::debug!(target: "deal_agent::cycle", "{}", line),
            Some(Some(RunEvent::Finished(finished))) => report = Some(finished),
            Some(None) => break,
            None => {
                tracing::info!("Cancelling in-flight planning cycle");
                let dropped = handle.dropped_lines();
                handle.cancel().await;
                let mut metrics = context.metrics.lock().await;
                metrics.record_dropped_lines(dropped);
                metrics.record_cancelled();
                return;
            }
        }
    }

    let dropped = handle.dropped_lines();
    let Some(report) = report else {
        tracing::warn!("Planning cycle ended without a result");
        context.metrics.lock().await.record_cancelled();
        return;
    };

    for (rank, opportunity) in report.opportunities.iter().enumerate() {
        tracing::info!(
            "#{} {} | price {}{:.2} | estimate {}{:.2} | discount {}{:.2} | {}",
            rank + 1,
            deal_core::text::truncate_chars(&opportunity.deal.product_description, 60),
            context.symbol,
            opportunity.deal.price,
            context.symbol,
            opportunity.estimate,
            context.symbol,
            opportunity.discount,
            opportunity.url()
        );
    }
    if let Some(url) = &report.alerted {
        tracing::info!("Alerted on {}", url);
    }

    if context.insights_count > 0 && !report.opportunities.is_empty() {
        for insight in context.insights.insights(&context.memory, context.insights_count).await {
            if insight.bullets.is_empty() {
                continue;
            }
            tracing::info!("Why {} sells: {}", insight.title, insight.bullets.join(" | "));
        }
    }

    let mut metrics = context.metrics.lock().await;
    metrics.record_dropped_lines(dropped);
    metrics.finish_cycle(cycle_start, &report);
}
