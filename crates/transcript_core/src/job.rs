use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub type JobId = usize;

/// Lifecycle of one URL inside a run.
///
/// The forward path is `Pending -> Resolving -> Fetching -> Cleaning -> Done`.
/// `Skipped`, `Failed` and `Cancelled` can be entered from any non-terminal
/// status. Nothing leaves a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    Pending,
    Resolving,
    Fetching,
    Cleaning,
    Done,
    Skipped,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Skipped | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Terminal statuses that count towards `RunState::completed`.
    pub fn counts_as_completed(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Skipped | JobStatus::Failed)
    }

    fn forward_rank(self) -> Option<u8> {
        match self {
            JobStatus::Pending => Some(0),
            JobStatus::Resolving => Some(1),
            JobStatus::Fetching => Some(2),
            JobStatus::Cleaning => Some(3),
            JobStatus::Done => Some(4),
            JobStatus::Skipped | JobStatus::Failed | JobStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.forward_rank(), next.forward_rank()) {
            (Some(from), Some(to)) => to == from + 1,
            // Skipped / Failed / Cancelled from any live status.
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Resolving => "resolving",
            JobStatus::Fetching => "fetching",
            JobStatus::Cleaning => "cleaning",
            JobStatus::Done => "done",
            JobStatus::Skipped => "skipped",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Per-URL unit of work. Owned by exactly one worker while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    url: String,
    status: JobStatus,
    history: Vec<JobStatus>,
    attempt: u32,
    title: Option<String>,
    output_path: Option<PathBuf>,
}

impl Job {
    pub fn new(id: JobId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            status: JobStatus::Pending,
            history: vec![JobStatus::Pending],
            attempt: 0,
            title: None,
            output_path: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Every status this job has held, oldest first.
    pub fn history(&self) -> &[JobStatus] {
        &self.history
    }

    pub fn reached(&self, status: JobStatus) -> bool {
        self.history.contains(&status)
    }

    /// Fetch attempts made so far; 0 until the first fetch starts.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to a terminal failure status unless the job already finished.
    pub fn finish_early(&mut self, terminal: JobStatus) {
        debug_assert!(matches!(
            terminal,
            JobStatus::Skipped | JobStatus::Failed | JobStatus::Cancelled
        ));
        if !self.status.is_terminal() {
            let _ = self.transition(terminal);
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    /// Records the written transcript and moves `Cleaning -> Done`.
    pub fn complete(&mut self, output_path: PathBuf) -> Result<(), TransitionError> {
        self.transition(JobStatus::Done)?;
        self.output_path = Some(output_path);
        Ok(())
    }
}
