//! Session: the state holder the user interface talks to
//!
//! Owns the cached metadata, the history list and the job poller. Nothing here is
//! global; callers hold a `Session` and pass it by reference.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::client::{Backend, HistoryRecord, VideoMetadata};
use crate::error::{Result, validate_url};
use crate::history::HistoryStore;
use crate::save::ArtifactSink;
use crate::task::{DownloadTask, JobPoller, PollerConfig, SavedArtifact};

pub struct Session<B> {
    poller: JobPoller<B>,
    history: HistoryStore,
    metadata: Mutex<Option<VideoMetadata>>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, config: PollerConfig) -> Self {
        Self {
            poller: JobPoller::new(backend, config),
            history: HistoryStore::new(),
            metadata: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        self.poller.backend()
    }

    /// Parse `url` into metadata. Any previously shown metadata is discarded first.
    #[instrument(skip(self))]
    pub async fn parse(&self, url: &str) -> Result<VideoMetadata> {
        let url = validate_url(url)?;
        self.reset_view();

        let metadata = self.backend().parse(url).await?;
        info!(fields = metadata.len(), "Video metadata parsed");
        *self.metadata.lock().unwrap_or_else(PoisonError::into_inner) = Some(metadata.clone());
        Ok(metadata)
    }

    pub fn metadata(&self) -> Option<VideoMetadata> {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the cached metadata
    pub fn reset_view(&self) {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Run a download to completion, then refresh the history list
    pub async fn download<S: ArtifactSink>(&self, url: &str, sink: &S) -> Result<SavedArtifact> {
        let saved = self.poller.download(url, sink).await?;
        if !self.history.refresh(self.backend()).await {
            warn!("History could not be refreshed after download");
        }
        Ok(saved)
    }

    pub async fn refresh_history(&self) -> bool {
        self.history.refresh(self.backend()).await
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.records()
    }

    pub fn task(&self) -> DownloadTask {
        self.poller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadTask> {
        self.poller.subscribe()
    }

    /// Abandon any in-flight download. Safe to call at any time.
    pub fn teardown(&self) {
        self.poller.cancel();
    }
}
