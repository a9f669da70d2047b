//! Download task lifecycle
//!
//! This module provides the task data model and the job poller that drives a single
//! download from start request to saved file.

mod models;
mod poller;

pub use models::{DownloadTask, TaskId, TaskState};
pub use poller::{JobPoller, PollerConfig, SavedArtifact};
