//! The seam between the task lifecycle logic and the transport

use crate::error::Result;

use super::models::{Artifact, HistoryRecord, VideoMetadata};

/// Operations the backend exposes. [`super::ApiClient`] implements this over HTTP.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Resolve a video URL into its metadata fields
    async fn parse(&self, url: &str) -> Result<VideoMetadata>;

    /// Ask the backend to start downloading `url` under `task_id`
    async fn start_job(&self, url: &str, task_id: &str) -> Result<()>;

    /// Current job progress in percent
    async fn progress(&self, task_id: &str) -> Result<u8>;

    /// Retrieve the finished file for a job that reported 100%
    async fn fetch_artifact(&self, url: &str, task_id: &str) -> Result<Artifact>;

    async fn history(&self) -> Result<Vec<HistoryRecord>>;
}
