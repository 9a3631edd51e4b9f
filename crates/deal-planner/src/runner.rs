//! Single-flight execution of planning cycles.
//!
//! Periodic and manual triggers share one [`CycleRunner`]. A trigger that
//! arrives while a cycle is in flight is rejected with [`TriggerError::Busy`]
//! rather than queued; the next tick picks up whatever it missed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::planner::{CycleReport, DealPlanner};
use crate::progress::ProgressReporter;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("a planning cycle is already running")]
    Busy,
}

#[derive(Debug)]
pub enum RunEvent {
    Log(String),
    Finished(CycleReport),
}

pub struct CycleRunner {
    planner: Arc<DealPlanner>,
    log_capacity: usize,
}

impl CycleRunner {
    pub fn new(planner: Arc<DealPlanner>) -> Self {
        Self {
            planner,
            log_capacity: 256,
        }
    }

    /// Size of the log buffer handed to each [`RunHandle`].
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn planner(&self) -> &Arc<DealPlanner> {
        &self.planner
    }

    pub fn is_busy(&self) -> bool {
        self.planner.is_busy()
    }

    /// Run a cycle inline.
    pub async fn trigger(&self) -> Result<CycleReport, TriggerError> {
        let claim = self.planner.try_claim().ok_or(TriggerError::Busy)?;
        Ok(self
            .planner
            .plan_claimed(&claim, &ProgressReporter::silent())
            .await)
    }

    /// Spawn a cycle and stream its progress.
    pub fn start(&self) -> Result<RunHandle, TriggerError> {
        let claim = self.planner.try_claim().ok_or(TriggerError::Busy)?;

        let (reporter, logs) = ProgressReporter::channel(self.log_capacity);
        let dropped = reporter.dropped_counter();
        let (result_tx, result_rx) = oneshot::channel();
        let planner = self.planner.clone();

        let task = tokio::spawn(async move {
            let report = planner.plan_claimed(&claim, &reporter).await;
            // Close the log stream and release the planner before publishing the result.
            drop(reporter);
            drop(claim);
            let _ = result_tx.send(report);
        });

        Ok(RunHandle {
            logs,
            result: Some(result_rx),
            task,
            dropped,
        })
    }
}

/// A running cycle: a finite stream of log lines, then one terminal result.
pub struct RunHandle {
    logs: mpsc::Receiver<String>,
    result: Option<oneshot::Receiver<CycleReport>>,
    task: JoinHandle<()>,
    dropped: Arc<AtomicUsize>,
}

impl RunHandle {
    /// Next event in emission order. Every buffered log line comes before
    /// `Finished`; `None` after `Finished`, or once a cancelled cycle's lines
    /// are drained. Cancel safe.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        if let Some(line) = self.logs.recv().await {
            return Some(RunEvent::Log(line));
        }
        let result = self.result.as_mut()?;
        let report = result.await.ok();
        self.result = None;
        report.map(RunEvent::Finished)
    }

    /// Drain the stream and return the report, `None` if the cycle was cancelled.
    pub async fn finish(mut self) -> Option<CycleReport> {
        while let Some(event) = self.next_event().await {
            if let RunEvent::Finished(report) = event {
                return Some(report);
            }
        }
        None
    }

    /// Abort the cycle and wait until it has released the runner.
    pub async fn cancel(self) {
        self.task.abort();
        let _ = self.task.await;
    }

    /// Log lines lost to a full buffer.
    pub fn dropped_lines(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
