//! Job poller: the download task state machine
//!
//! One task at a time moves through
//! `Idle -> Starting -> Polling -> Fetching -> Done`, dropping to `Failed` from any
//! of the middle states. Polling runs on a single interval timer whose tick awaits
//! the progress response before the next tick is taken, so readings are applied in
//! the order they arrive and never overlap. The whole flow runs under a
//! [`CancellationToken`] kept next to the task, so tearing down is one call.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::models::{DownloadTask, TaskId, TaskState};
use crate::client::Backend;
use crate::disposition;
use crate::error::{Error, Result, validate_url};
use crate::save::{ARTIFACT_MEDIA_TYPE, ArtifactSink};

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    /// Time between progress requests
    pub poll_interval: Duration,
    /// Pause between the 100% reading and the retrieval request, giving the
    /// backend time to flush the file to storage
    pub settle_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// A download that made it all the way to `Done`
#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub task_id: TaskId,
    pub file_name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

pub struct JobPoller<B> {
    backend: B,
    config: PollerConfig,
    task_tx: watch::Sender<DownloadTask>,
    cancel_token: Mutex<CancellationToken>,
}

impl<B: Backend> JobPoller<B> {
    pub fn new(backend: B, config: PollerConfig) -> Self {
        let (task_tx, _) = watch::channel(DownloadTask::default());
        Self {
            backend,
            config,
            task_tx,
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Receiver that sees every change to the task
    pub fn subscribe(&self) -> watch::Receiver<DownloadTask> {
        self.task_tx.subscribe()
    }

    pub fn snapshot(&self) -> DownloadTask {
        self.task_tx.borrow().clone()
    }

    /// Tear down the active flow, if any. The polling timer and the settling delay
    /// are dropped and the task goes back to `Idle`.
    pub fn cancel(&self) {
        self.cancel_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        self.task_tx.send_if_modified(|task| {
            if task.state.accepts_start() {
                return false;
            }
            info!(task_id = ?task.task_id, state = %task.state, "Tearing down download task");
            *task = DownloadTask::default();
            true
        });
    }

    /// Run a complete download: start the job, poll until it reports 100%, wait
    /// the settling delay, retrieve the artifact and hand it to `sink`.
    ///
    /// Fails with [`Error::TaskBusy`] when another download has not finished yet.
    #[instrument(name = "download", skip(self, sink), fields(task_id = tracing::field::Empty))]
    pub async fn download<S: ArtifactSink>(&self, url: &str, sink: &S) -> Result<SavedArtifact> {
        let url = validate_url(url)?;
        let (task_id, token) = self.begin(url)?;
        tracing::Span::current().record("task_id", task_id.as_str());
        let _guard = FlowGuard {
            task_tx: &self.task_tx,
            task_id: task_id.clone(),
        };

        info!("Starting download task");

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            result = self.run(&task_id, url, sink) => result,
        };

        match &outcome {
            Ok(saved) => {
                self.update(&task_id, |task| {
                    task.state = TaskState::Done;
                    task.error = None;
                    true
                });
                info!(file = %saved.file_name, path = ?saved.path, "Download task done");
            }
            Err(Error::Cancelled) => info!("Download task cancelled"),
            Err(e) => {
                error!(error = %e, "Download task failed");
                self.update(&task_id, |task| {
                    task.fail(e.to_string());
                    true
                });
            }
        }

        outcome
    }

    /// Claim the task slot for a new download
    fn begin(&self, url: &str) -> Result<(TaskId, CancellationToken)> {
        let mut claimed = None;
        self.task_tx.send_if_modified(|task| {
            if !task.state.accepts_start() {
                return false;
            }
            let task_id = TaskId::generate();
            let token = CancellationToken::new();
            *self
                .cancel_token
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = token.clone();
            *task = DownloadTask::starting(task_id.clone(), url);
            claimed = Some((task_id, token));
            true
        });

        claimed.ok_or_else(|| {
            warn!("Refusing to start a download while another one is active");
            Error::TaskBusy
        })
    }

    async fn run<S: ArtifactSink>(
        &self,
        task_id: &TaskId,
        url: &str,
        sink: &S,
    ) -> Result<SavedArtifact> {
        self.backend.start_job(url, task_id.as_str()).await?;
        self.update(task_id, |task| {
            task.state = TaskState::Polling;
            true
        });
        debug!("Job accepted, polling for progress");

        self.poll_until_complete(task_id).await?;

        trace!(delay = ?self.config.settle_delay, "Waiting for the backend to settle");
        tokio::time::sleep(self.config.settle_delay).await;

        self.update(task_id, |task| {
            task.state = TaskState::Fetching;
            true
        });
        let artifact = self.backend.fetch_artifact(url, task_id.as_str()).await?;
        trace!(content_length = ?artifact.content_length, "Artifact body incoming");

        let resolved = disposition::resolve(artifact.content_disposition.as_deref());
        debug!(?resolved, "Resolved artifact file name");
        let file_name = resolved.into_file_name();

        let stored = sink
            .save(&file_name, ARTIFACT_MEDIA_TYPE, artifact.body)
            .await?;

        Ok(SavedArtifact {
            task_id: task_id.clone(),
            file_name,
            path: stored.path,
            bytes: stored.bytes,
        })
    }

    /// Returns once the backend reports 100%. The timer lives in this frame, so
    /// returning (or failing) stops it exactly once.
    async fn poll_until_complete(&self, task_id: &TaskId) -> Result<()> {
        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reported = self.backend.progress(task_id.as_str()).await?;
            trace!(reported, "Progress reading");

            self.update(task_id, |task| task.record_progress(reported));

            if reported >= 100 {
                debug!("Backend reports the job complete");
                return Ok(());
            }
        }
    }

    /// Mutate the task only if it still belongs to `task_id`, so a flow that has
    /// been torn down cannot touch its successor
    fn update(&self, task_id: &TaskId, f: impl FnOnce(&mut DownloadTask) -> bool) -> bool {
        self.task_tx
            .send_if_modified(|task| task.is_task(task_id) && f(task))
    }
}

/// Releases the task slot if the download future is dropped mid-flight
struct FlowGuard<'a> {
    task_tx: &'a watch::Sender<DownloadTask>,
    task_id: TaskId,
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.task_tx.send_if_modified(|task| {
            if !task.is_task(&self.task_id) || task.state.accepts_start() {
                return false;
            }
            debug!(task_id = %self.task_id, "Download abandoned, releasing task");
            *task = DownloadTask::default();
            true
        });
    }
}
