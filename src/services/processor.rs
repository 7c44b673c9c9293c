use std::sync::Arc;

use strum::Display;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::store::{RecordStore, StoreError};
use crate::models::record::Record;
use crate::services::caption::{DescribeError, DescriptionGenerator};
use crate::services::fetcher::{FetchError, ResourceFetcher};
use crate::services::manifest::{parse_manifest, ManifestError};

/// Which of the two downloads failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FetchStage {
    Manifest,
    Image,
}

/// Why a record ended up marked failed. Never escapes the record's pass.
#[derive(Debug, thiserror::Error)]
pub enum RecordFailure {
    #[error("Record has no uri")]
    MissingReference,

    #[error("Failed to fetch {stage}: {source}")]
    Transport {
        stage: FetchStage,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Caption generation failed: {0}")]
    Inference(#[from] DescribeError),

    #[error("Pipeline aborted: {0}")]
    Aborted(String),
}

/// Terminal result of resolving one record.
#[derive(Debug)]
pub enum Outcome {
    Described(String),
    Failed(RecordFailure),
}

/// Counts for one processed batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub described: usize,
    pub failed: usize,
}

/// Runs the manifest -> image -> caption pipeline for each record of a batch
/// and commits exactly one terminal write per record.
pub struct BatchProcessor {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn ResourceFetcher>,
    describer: Arc<dyn DescriptionGenerator>,
}

impl BatchProcessor {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            fetcher: Arc::clone(&state.fetcher),
            describer: Arc::clone(&state.describer),
        }
    }

    /// Resolve a record to its terminal outcome without touching the store.
    ///
    /// The pipeline runs in its own task and is awaited straight away, so a
    /// panicking collaborator fails this record instead of the loop.
    pub async fn resolve(&self, record: &Record) -> Outcome {
        let task = tokio::spawn(caption(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.describer),
            record.clone(),
        ));

        match task.await {
            Ok(Ok(caption)) => Outcome::Described(caption),
            Ok(Err(failure)) => Outcome::Failed(failure),
            Err(e) => Outcome::Failed(RecordFailure::Aborted(e.to_string())),
        }
    }

    /// Write the single terminal mutation for `outcome`.
    pub async fn commit(&self, id: Uuid, outcome: &Outcome) -> Result<(), StoreError> {
        match outcome {
            Outcome::Described(caption) => {
                self.store.mark_succeeded(id, caption).await?;
                tracing::info!(record_id = %id, caption = %caption, "Record described");
            }
            Outcome::Failed(failure) => {
                self.store.mark_failed(id).await?;
                tracing::warn!(record_id = %id, reason = %failure, "Record marked failed");
            }
        }
        Ok(())
    }

    pub async fn process_record(&self, record: &Record) -> Result<Outcome, StoreError> {
        let outcome = self.resolve(record).await;
        self.commit(record.id, &outcome).await?;
        Ok(outcome)
    }

    /// Process records one after another in the order given.
    ///
    /// A store error stops the batch; records not reached stay eligible.
    pub async fn process_batch(&self, records: &[Record]) -> Result<BatchSummary, StoreError> {
        let mut summary = BatchSummary::default();
        for record in records {
            match self.process_record(record).await? {
                Outcome::Described(_) => summary.described += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }
}

async fn caption(
    fetcher: Arc<dyn ResourceFetcher>,
    describer: Arc<dyn DescriptionGenerator>,
    record: Record,
) -> Result<String, RecordFailure> {
    let uri = record
        .uri
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or(RecordFailure::MissingReference)?;

    let manifest = fetcher
        .fetch(uri)
        .await
        .map_err(|source| RecordFailure::Transport {
            stage: FetchStage::Manifest,
            source,
        })?;

    let image_url = parse_manifest(&manifest)?;

    let image_bytes = fetcher
        .fetch(&image_url)
        .await
        .map_err(|source| RecordFailure::Transport {
            stage: FetchStage::Image,
            source,
        })?;

    Ok(describer.describe(&image_bytes).await?)
}
