//! In-memory collaborators for driving the worker without PostgreSQL,
//! network access or a captioning model.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use image_describer::{
    db::store::{RecordStore, StoreError},
    models::record::{Record, RecordStatus, StoredRecord},
    services::{
        caption::{DescribeError, DescriptionGenerator},
        fetcher::{FetchError, ResourceFetcher},
        reconcile::Sleeper,
    },
};
use reqwest::StatusCode;
use uuid::Uuid;

/// Everything the collaborators observe, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Query,
    Fetch(String),
    Describe,
    MarkFailed(Uuid),
    MarkSucceeded(Uuid, String),
    Sleep(Duration),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

/// `RecordStore` over a vector, preserving insertion order.
pub struct MemoryRecordStore {
    rows: Mutex<Vec<StoredRecord>>,
    log: EventLog,
    failing_queries: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            log,
            failing_queries: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, uri: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.lock().unwrap().push(StoredRecord {
            id,
            uri: uri.map(str::to_string),
            description: None,
            status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        id
    }

    pub fn get(&self, id: Uuid) -> Option<StoredRecord> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    /// Make the next `n` eligibility queries fail as if the database were down.
    pub fn fail_next_queries(&self, n: usize) {
        self.failing_queries.store(n, Ordering::SeqCst);
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut StoredRecord)) {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| r.id == id) {
            apply(row);
            row.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_eligible(&self, limit: usize) -> Result<Vec<Record>, StoreError> {
        self.log.lock().unwrap().push(Event::Query);

        let failing = self.failing_queries.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_queries.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_eligible())
            .take(limit)
            .map(|r| Record {
                id: r.id,
                uri: r.uri.clone(),
            })
            .collect())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        self.log.lock().unwrap().push(Event::MarkFailed(id));
        self.update(id, |row| row.status = Some(RecordStatus::Failed));
        Ok(())
    }

    async fn mark_succeeded(&self, id: Uuid, description: &str) -> Result<(), StoreError> {
        self.log
            .lock()
            .unwrap()
            .push(Event::MarkSucceeded(id, description.to_string()));
        self.update(id, |row| {
            row.description = Some(description.to_string());
            row.status = None;
        });
        Ok(())
    }
}

/// Canned response for one URL.
#[derive(Debug, Clone)]
pub enum Response {
    Body(Vec<u8>),
    Timeout,
    Status(u16),
}

/// `ResourceFetcher` answering from a URL table. Unknown URLs get a 404.
pub struct StubFetcher {
    responses: HashMap<String, Response>,
    log: EventLog,
}

impl StubFetcher {
    pub fn new(log: EventLog) -> Self {
        Self {
            responses: HashMap::new(),
            log,
        }
    }

    pub fn with(mut self, url: &str, response: Response) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    /// Register a manifest at `uri` pointing at an image served at `image_url`.
    pub fn with_image(self, uri: &str, image_url: &str) -> Self {
        let manifest = serde_json::json!({ "image": image_url }).to_string();
        self.with(uri, Response::Body(manifest.into_bytes()))
            .with(image_url, Response::Body(b"image-bytes".to_vec()))
    }
}

#[async_trait]
impl ResourceFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.log.lock().unwrap().push(Event::Fetch(url.to_string()));
        match self.responses.get(url) {
            Some(Response::Body(bytes)) => Ok(bytes.clone()),
            Some(Response::Timeout) => Err(FetchError::Timeout),
            Some(Response::Status(code)) => Err(FetchError::Status(
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            )),
            None => Err(FetchError::Status(StatusCode::NOT_FOUND)),
        }
    }
}

/// `DescriptionGenerator` that returns a fixed caption, fails when unset, or
/// panics when told to.
pub struct StubDescriber {
    caption: Option<String>,
    panics: bool,
    log: EventLog,
}

impl StubDescriber {
    pub fn captioning(caption: &str, log: EventLog) -> Self {
        Self {
            caption: Some(caption.to_string()),
            panics: false,
            log,
        }
    }

    pub fn failing(log: EventLog) -> Self {
        Self {
            caption: None,
            panics: false,
            log,
        }
    }

    pub fn panicking(log: EventLog) -> Self {
        Self {
            caption: None,
            panics: true,
            log,
        }
    }
}

#[async_trait]
impl DescriptionGenerator for StubDescriber {
    async fn describe(&self, _image_bytes: &[u8]) -> Result<String, DescribeError> {
        self.log.lock().unwrap().push(Event::Describe);
        if self.panics {
            panic!("image decoder panicked");
        }
        self.caption.clone().ok_or(DescribeError::EmptyCaption)
    }
}

/// `Sleeper` that records the requested duration and returns immediately.
pub struct RecordingSleeper {
    log: EventLog,
}

impl RecordingSleeper {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.log.lock().unwrap().push(Event::Sleep(duration));
    }
}
