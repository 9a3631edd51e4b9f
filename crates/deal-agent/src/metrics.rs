use deal_planner::CycleReport;
use std::time::Instant;

/// Structured telemetry for the deal agent.
/// Tracks per-cycle timing and aggregate counts since startup.
pub struct AgentMetrics {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub cycles_cancelled: u64,
    pub empty_cycles: u64,
    pub opportunities_found: u64,
    pub remembered: u64,
    pub alerts_sent: u64,
    pub best_discount: f64,
    pub log_lines_dropped: u64,

    // Last cycle
    pub last_total_duration_ms: u64,
    pub last_opportunities: usize,

    log_interval_cycles: u64,
}

impl AgentMetrics {
    pub fn new(log_interval_cycles: u64) -> Self {
        Self {
            cycles_run: 0,
            cycles_skipped: 0,
            cycles_cancelled: 0,
            empty_cycles: 0,
            opportunities_found: 0,
            remembered: 0,
            alerts_sent: 0,
            best_discount: 0.0,
            log_lines_dropped: 0,
            last_total_duration_ms: 0,
            last_opportunities: 0,
            log_interval_cycles,
        }
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    /// A trigger that found a cycle already running.
    pub fn record_skipped(&mut self) {
        self.cycles_skipped += 1;
    }

    pub fn record_cancelled(&mut self) {
        self.cycles_cancelled += 1;
    }

    pub fn record_dropped_lines(&mut self, dropped: usize) {
        self.log_lines_dropped += dropped as u64;
    }

    pub fn finish_cycle(&mut self, cycle_start: Instant, report: &CycleReport) {
        self.last_total_duration_ms = cycle_start.elapsed().as_millis() as u64;
        self.cycles_run += 1;

        self.last_opportunities = report.opportunities.len();
        self.opportunities_found += report.opportunities.len() as u64;
        self.remembered += report.remembered as u64;
        if report.opportunities.is_empty() {
            self.empty_cycles += 1;
        }
        if report.alerted.is_some() {
            self.alerts_sent += 1;
        }
        if let Some(best) = report.best() {
            if best.discount > self.best_discount {
                self.best_discount = best.discount;
            }
        }

        if self.log_interval_cycles > 0 && self.cycles_run.is_multiple_of(self.log_interval_cycles) {
            self.log_metrics();
        }
    }

    /// Share of completed cycles that produced at least one opportunity (0-100%)
    pub fn hit_rate(&self) -> f64 {
        if self.cycles_run == 0 {
            return 0.0;
        }
        let productive = self.cycles_run - self.empty_cycles;
        (productive as f64 / self.cycles_run as f64) * 100.0
    }

    /// Emit structured telemetry via tracing
    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            cycles_skipped = self.cycles_skipped,
            cycles_cancelled = self.cycles_cancelled,
            opportunities = self.opportunities_found,
            remembered = self.remembered,
            alerts_sent = self.alerts_sent,
            best_discount = format!("{:.2}", self.best_discount),
            hit_rate = format!("{:.1}%", self.hit_rate()),
            log_lines_dropped = self.log_lines_dropped,
            last_cycle_ms = self.last_total_duration_ms,
            "Agent metrics summary"
        );
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "cycles_run": self.cycles_run,
            "cycles_skipped": self.cycles_skipped,
            "cycles_cancelled": self.cycles_cancelled,
            "opportunities_found": self.opportunities_found,
            "remembered": self.remembered,
            "alerts_sent": self.alerts_sent,
            "best_discount": self.best_discount,
        })
    }
}
