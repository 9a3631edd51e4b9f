use deal_core::{AlertSink, Deal, Opportunity};
use deal_memory::Memory;
use deal_scanner::DealSource;
use pricing_ensemble::PricingEnsemble;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use crate::alert_record::AlertRecord;
use crate::progress::ProgressReporter;

/// Where a planning cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    Idle,
    Scanning,
    Pricing,
    Ranking,
    Alerting,
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Confirmed deals priced per cycle
    pub deals_per_scan: usize,
    /// Discount (working currency) the best deal must exceed to alert
    pub alert_threshold: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            deals_per_scan: 5,
            alert_threshold: 50.0,
        }
    }
}

/// Outcome of one scan → price → rank → alert cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// This cycle's opportunities, best discount first.
    pub opportunities: Vec<Opportunity>,
    /// URL an alert was delivered for.
    pub alerted: Option<String>,
    /// Opportunities newly added to memory.
    pub remembered: usize,
}

impl CycleReport {
    pub fn best(&self) -> Option<&Opportunity> {
        self.opportunities.first()
    }
}

/// Resets the phase to idle however the cycle ends, including cancellation.
struct PhaseGuard<'a>(&'a watch::Sender<CyclePhase>);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(CyclePhase::Idle);
    }
}

/// Exclusive right to run one cycle on a planner. Dropping it lets the next
/// cycle start.
pub struct CycleClaim(OwnedMutexGuard<()>);

pub struct DealPlanner {
    scanner: Arc<dyn DealSource>,
    ensemble: Arc<PricingEnsemble>,
    alerts: Arc<dyn AlertSink>,
    alert_record: Arc<AlertRecord>,
    memory: Arc<Memory>,
    config: PlannerConfig,
    phase: watch::Sender<CyclePhase>,
    gate: Arc<Mutex<()>>,
}

impl DealPlanner {
    pub fn new(
        scanner: Arc<dyn DealSource>,
        ensemble: Arc<PricingEnsemble>,
        alerts: Arc<dyn AlertSink>,
        memory: Arc<Memory>,
        config: PlannerConfig,
    ) -> Self {
        let (phase, _) = watch::channel(CyclePhase::Idle);
        Self {
            scanner,
            ensemble,
            alerts,
            alert_record: Arc::new(AlertRecord::new()),
            memory,
            config,
            phase,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Share an alert record with other planners in the process.
    pub fn with_alert_record(mut self, alert_record: Arc<AlertRecord>) -> Self {
        self.alert_record = alert_record;
        self
    }

    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    pub fn alert_record(&self) -> &Arc<AlertRecord> {
        &self.alert_record
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<CyclePhase> {
        self.phase.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Claim the planner without waiting, `None` while a cycle is in flight.
    pub fn try_claim(&self) -> Option<CycleClaim> {
        self.gate.clone().try_lock_owned().ok().map(CycleClaim)
    }

    async fn claim(&self) -> CycleClaim {
        CycleClaim(self.gate.clone().lock_owned().await)
    }

    /// Price one deal through the ensemble.
    pub async fn price_deal(&self, deal: Deal, progress: &ProgressReporter) -> Opportunity {
        let symbol = self.ensemble.working_currency().symbol();
        progress.log(format!("Pricing {}", deal.url));

        let estimate = self.ensemble.price(&deal.product_description).await;
        let opportunity = Opportunity::new(deal, estimate);

        progress.log(format!(
            "Processed a deal with estimate {}{:.2} and discount {}{:.2}",
            symbol, opportunity.estimate, symbol, opportunity.discount
        ));
        opportunity
    }

    /// Stable sort by discount, largest first; ties keep scan order.
    pub fn rank(opportunities: &mut [Opportunity]) {
        opportunities.sort_by(|a, b| b.discount.total_cmp(&a.discount));
    }

    /// Run one full cycle, waiting for any cycle already in flight. Never
    /// fails: every error along the way degrades to fewer opportunities and a
    /// log line.
    pub async fn plan_cycle(&self, progress: &ProgressReporter) -> CycleReport {
        let claim = self.claim().await;
        self.plan_claimed(&claim, progress).await
    }

    /// Run one full cycle under a claim the caller already holds.
    pub(crate) async fn plan_claimed(
        &self,
        _claim: &CycleClaim,
        progress: &ProgressReporter,
    ) -> CycleReport {
        let _idle_on_exit = PhaseGuard(&self.phase);
        let symbol = self.ensemble.working_currency().symbol();

        self.phase.send_replace(CyclePhase::Scanning);
        progress.log("Kicking off a planning cycle");

        let Some(selection) = self.scanner.scan(&self.memory).await else {
            progress.log("No new deals this cycle");
            return CycleReport::default();
        };
        progress.log(format!("Scanner confirmed {} deals", selection.deals.len()));

        self.phase.send_replace(CyclePhase::Pricing);
        let mut opportunities = Vec::new();
        for deal in selection.deals.into_iter().take(self.config.deals_per_scan) {
            opportunities.push(self.price_deal(deal, progress).await);
        }

        self.phase.send_replace(CyclePhase::Ranking);
        Self::rank(&mut opportunities);

        let mut alerted = None;
        if let Some(best) = opportunities.first() {
            progress.log(format!(
                "Best deal has discount {}{:.2}",
                symbol, best.discount
            ));

            if best.discount > self.config.alert_threshold {
                self.phase.send_replace(CyclePhase::Alerting);
                alerted = self.dispatch_alert(best, progress).await;
            }
        }

        let mut remembered = 0;
        for opportunity in &opportunities {
            if self.memory.append(opportunity.clone()).await {
                remembered += 1;
            }
        }

        progress.log(format!(
            "Planning cycle complete: {} opportunities, {} new in memory",
            opportunities.len(),
            remembered
        ));

        CycleReport {
            opportunities,
            alerted,
            remembered,
        }
    }

    async fn dispatch_alert(&self, best: &Opportunity, progress: &ProgressReporter) -> Option<String> {
        if !self.alert_record.try_claim(best.url()) {
            progress.log(format!("Already alerted for {}, skipping", best.url()));
            return None;
        }

        match self.alerts.alert(best).await {
            Ok(()) => {
                progress.log(format!("Alert sent for {}", best.url()));
                Some(best.url().to_string())
            }
            Err(e) => {
                tracing::warn!("Alert dispatch failed: {}", e);
                progress.log(format!("Alert for {} failed: {}", best.url(), e));
                None
            }
        }
    }

    /// Best opportunity of a fresh cycle, if any.
    pub async fn plan(&self) -> Option<Opportunity> {
        self.plan_cycle(&ProgressReporter::silent())
            .await
            .opportunities
            .into_iter()
            .next()
    }

    /// Every opportunity created by a fresh cycle, best first.
    pub async fn run(&self) -> Vec<Opportunity> {
        self.plan_cycle(&ProgressReporter::silent()).await.opportunities
    }
}
