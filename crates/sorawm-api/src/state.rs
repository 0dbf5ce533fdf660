//! Application state.

use std::sync::Arc;

use sorawm_media::WatermarkRemover;
use sorawm_storage::{StorageLayout, StorageResult};
use sorawm_worker::{JobDispatcher, TaskStore, WorkerConfig};

use crate::config::ApiConfig;
use crate::services::{DailyQuota, ResultRetriever, UploadIngestor};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub layout: Arc<StorageLayout>,
    pub store: Arc<TaskStore>,
    pub dispatcher: Arc<JobDispatcher>,
    pub quota: Arc<DailyQuota>,
    pub ingestor: UploadIngestor,
    pub results: ResultRetriever,
}

impl AppState {
    /// Create the storage directories and start the job dispatcher.
    pub async fn new(
        config: ApiConfig,
        worker_config: WorkerConfig,
        remover: Arc<dyn WatermarkRemover>,
    ) -> StorageResult<Self> {
        let layout = Arc::new(StorageLayout::new(&config.data_dir));
        layout.ensure_dirs().await?;

        let store = Arc::new(TaskStore::new());
        let dispatcher = Arc::new(JobDispatcher::start(
            worker_config,
            Arc::clone(&store),
            remover,
        ));
        let quota = Arc::new(DailyQuota::new(config.daily_quota));
        let ingestor = UploadIngestor::new(
            Arc::clone(&layout),
            Arc::clone(&store),
            Arc::clone(&dispatcher),
        );
        let results = ResultRetriever::new(Arc::clone(&store));

        Ok(Self {
            config,
            layout,
            store,
            dispatcher,
            quota,
            ingestor,
            results,
        })
    }
}
