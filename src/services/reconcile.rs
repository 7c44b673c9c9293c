use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app_state::AppState;
use crate::db::store::{RecordStore, StoreError};
use crate::services::processor::{BatchProcessor, BatchSummary};

/// Suspends the loop between idle polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// `Sleeper` backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub batch_size: usize,
    pub sleep_interval: Duration,
}

/// What the last poll found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// A batch was processed; poll again right away.
    Draining(BatchSummary),
    /// Nothing eligible, or the cycle failed; back off before polling again.
    Idle,
}

/// Pulls eligible records and processes them until the process is killed.
pub struct ReconciliationLoop<S: Sleeper = TokioSleeper> {
    store: Arc<dyn RecordStore>,
    processor: BatchProcessor,
    sleeper: S,
    settings: LoopSettings,
}

impl ReconciliationLoop<TokioSleeper> {
    pub fn new(state: &AppState, settings: LoopSettings) -> Self {
        Self::with_sleeper(state, settings, TokioSleeper)
    }
}

impl<S: Sleeper> ReconciliationLoop<S> {
    pub fn with_sleeper(state: &AppState, settings: LoopSettings, sleeper: S) -> Self {
        Self {
            store: Arc::clone(&state.store),
            processor: BatchProcessor::new(state),
            sleeper,
            settings,
        }
    }

    /// Fetch one batch and process it. Errors are logged and reported as idle.
    pub async fn poll_once(&self) -> LoopState {
        match self.drain_batch().await {
            Ok(Some(summary)) => {
                tracing::debug!(
                    described = summary.described,
                    failed = summary.failed,
                    "Batch processed, polling again"
                );
                LoopState::Draining(summary)
            }
            Ok(None) => {
                tracing::info!(
                    sleep_secs = self.settings.sleep_interval.as_secs(),
                    "No records left to process, waiting for new entries"
                );
                LoopState::Idle
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    sleep_secs = self.settings.sleep_interval.as_secs(),
                    "Reconciliation cycle failed, will retry"
                );
                LoopState::Idle
            }
        }
    }

    async fn drain_batch(&self) -> Result<Option<BatchSummary>, StoreError> {
        let records = self.store.fetch_eligible(self.settings.batch_size).await?;
        if records.is_empty() {
            return Ok(None);
        }

        tracing::info!(count = records.len(), "Processing batch");
        let summary = self.processor.process_batch(&records).await?;
        Ok(Some(summary))
    }

    /// One poll plus the backoff sleep when idle.
    pub async fn cycle(&self) -> LoopState {
        let state = self.poll_once().await;
        if state == LoopState::Idle {
            self.sleeper.sleep(self.settings.sleep_interval).await;
        }
        state
    }

    /// Run forever. Only process termination stops the loop.
    pub async fn run(&self) {
        tracing::info!(
            batch_size = self.settings.batch_size,
            sleep_secs = self.settings.sleep_interval.as_secs(),
            "Starting reconciliation loop"
        );
        loop {
            self.cycle().await;
        }
    }
}
