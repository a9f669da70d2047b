//! Data structures for the download task lifecycle

use std::fmt;

use ulid::Ulid;

/// Opaque identifier correlating the start, progress and retrieval calls of one job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Fresh identifier. ULIDs are time ordered and carry 80 random bits, so two
    /// ids generated in the same millisecond still differ.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskState {
    #[default]
    Idle,
    /// Job-start request in flight
    Starting,
    /// Polling the backend for progress
    Polling,
    /// Retrieving the finished artifact
    Fetching,
    Done,
    Failed,
}

impl TaskState {
    /// Whether a new download may be started from this state
    pub fn accepts_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Done | Self::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::Polling => write!(f, "Polling"),
            Self::Fetching => write!(f, "Fetching"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// The single download task owned by the job poller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadTask {
    pub task_id: Option<TaskId>,
    pub source_url: String,
    pub state: TaskState,
    /// Last progress reported by the backend, 0-100
    pub progress: u8,
    /// Message of the failure that moved the task to `Failed`
    pub error: Option<String>,
}

impl DownloadTask {
    pub fn starting(task_id: TaskId, source_url: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id),
            source_url: source_url.into(),
            state: TaskState::Starting,
            progress: 0,
            error: None,
        }
    }

    pub fn is_task(&self, id: &TaskId) -> bool {
        self.task_id.as_ref() == Some(id)
    }

    /// Apply a progress reading. Readings lower than the current value are stale
    /// and ignored; returns whether anything changed.
    pub fn record_progress(&mut self, reported: u8) -> bool {
        let reported = reported.min(100);
        if reported <= self.progress {
            return false;
        }
        self.progress = reported;
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = TaskState::Failed;
        self.progress = 0;
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| TaskId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut task = DownloadTask::starting(TaskId::generate(), "https://v");
        assert!(task.record_progress(30));
        assert!(!task.record_progress(20));
        assert_eq!(task.progress, 30);
        assert!(task.record_progress(250));
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_fail_resets_progress() {
        let mut task = DownloadTask::starting(TaskId::generate(), "https://v");
        task.record_progress(70);
        task.fail("boom");
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.progress, 0);
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_states_accepting_start() {
        assert!(TaskState::Idle.accepts_start());
        assert!(TaskState::Done.accepts_start());
        assert!(TaskState::Failed.accepts_start());
        assert!(!TaskState::Starting.accepts_start());
        assert!(!TaskState::Polling.accepts_start());
        assert!(!TaskState::Fetching.accepts_start());
    }
}
