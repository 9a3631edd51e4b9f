use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Cycle log lines: always traced, and optionally streamed to a consumer.
///
/// Streaming is best effort. A full buffer drops the line (and counts it)
/// rather than stalling the cycle.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<String>>,
    dropped: Arc<AtomicUsize>,
}

impl ProgressReporter {
    /// Trace-only reporter.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reporter = Self {
            tx: Some(tx),
            dropped: Arc::new(AtomicUsize::new(0)),
        };
        (reporter, rx)
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!("{}", message);

        if let Some(tx) = &self.tx {
            let line = format!(
                "[{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                message
            );
            if tx.try_send(line).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped_counter(&self) -> Arc<AtomicUsize> {
        self.dropped.clone()
    }
}
