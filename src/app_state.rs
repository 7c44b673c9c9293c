use std::sync::Arc;

use crate::db::store::RecordStore;
use crate::services::{caption::DescriptionGenerator, fetcher::ResourceFetcher};

/// Process-wide collaborators, built once at startup and shared by the
/// processor and the loop.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub describer: Arc<dyn DescriptionGenerator>,
}

impl AppState {
    pub fn new(
        store: impl RecordStore + 'static,
        fetcher: impl ResourceFetcher + 'static,
        describer: impl DescriptionGenerator + 'static,
    ) -> Self {
        Self {
            store: Arc::new(store),
            fetcher: Arc::new(fetcher),
            describer: Arc::new(describer),
        }
    }
}
