use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use transcript_core::{
    sanitize_title, Event, Job, JobStatus, RetryPolicy, RetryState, TransitionError,
};

use crate::clean::{CleanError, TranscriptCleaner};
use crate::fetch::{FetchError, SubtitleFetcher};
use crate::persist::{PersistError, TranscriptWriter};
use crate::sink::EventSink;

/// Name used when a title sanitizes to nothing.
pub const FALLBACK_SAFE_NAME: &str = "untitled";

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("{0}")]
    Unexpected(String),
    #[error("cancelled")]
    Cancelled,
}

impl JobError {
    fn is_cancelled(&self) -> bool {
        matches!(
            self,
            JobError::Cancelled
                | JobError::Fetch(FetchError::Cancelled)
                | JobError::Clean(CleanError::Cancelled)
        )
    }
}

/// Drives one [`Job`] through resolve, fetch, clean and persist.
pub struct JobRunner {
    fetcher: SubtitleFetcher,
    cleaner: Arc<dyn TranscriptCleaner>,
    writer: TranscriptWriter,
    retry_policy: RetryPolicy,
}

impl JobRunner {
    pub fn new(
        fetcher: SubtitleFetcher,
        cleaner: Arc<dyn TranscriptCleaner>,
        writer: TranscriptWriter,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            cleaner,
            writer,
            retry_policy,
        }
    }

    /// Runs `job` until it reaches a terminal status. Every failure is
    /// reported to `sink` and absorbed here.
    pub async fn run(&self, job: &mut Job, cancel: &CancellationToken, sink: &dyn EventSink) {
        if let Err(err) = self.drive(job, cancel, sink).await {
            self.settle_failure(job, err, sink);
        }
        engine_info!(job = job.id(); "{} finished as {}", job.url(), job.status());
    }

    async fn drive(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> Result<(), JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        job.transition(JobStatus::Resolving)?;
        let title = self.fetcher.resolve_title(job.url(), cancel).await?;
        let safe_name = match sanitize_title(&title) {
            name if name.is_empty() => FALLBACK_SAFE_NAME.to_string(),
            name => name,
        };
        engine_debug!(job = job.id(); "title {:?} -> {}", title, safe_name);
        sink.emit(Event::log(format!("Downloading subtitles for: {title}")));
        job.set_title(title);

        job.transition(JobStatus::Fetching)?;
        // Same-titled jobs in one work dir must not share a track file.
        let track_name = format!("{safe_name}.{}", job.id());
        let mut retry = RetryState::new(self.retry_policy);
        let fetched = self
            .fetcher
            .fetch(job.url(), &track_name, &mut retry, cancel, sink)
            .await;
        job.set_attempt(retry.attempt());
        let track = fetched?;

        let saved = self.save_transcript(job, &track.path, &safe_name, cancel, sink).await;
        discard_track(job, &track.path);
        saved
    }

    async fn save_transcript(
        &self,
        job: &mut Job,
        track: &Path,
        safe_name: &str,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> Result<(), JobError> {
        job.transition(JobStatus::Cleaning)?;
        let lines = self.clean_track(track.to_path_buf(), cancel).await?;
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        // The write itself is atomic; once started it runs to completion.
        let output = self.writer.write_transcript(safe_name, &lines)?;
        job.complete(output.clone())?;
        sink.emit(Event::log(format!("Saved: {}", output.display())));
        Ok(())
    }

    async fn clean_track(
        &self,
        path: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, JobError> {
        let cleaner = Arc::clone(&self.cleaner);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || cleaner.clean_file(&path, &cancel))
            .await
            .map_err(|err| JobError::Unexpected(format!("cleaning task failed: {err}")))?
            .map_err(JobError::from)
    }

    fn settle_failure(&self, job: &mut Job, err: JobError, sink: &dyn EventSink) {
        if err.is_cancelled() {
            let stage = job.status();
            job.finish_early(JobStatus::Cancelled);
            sink.emit(Event::log(match stage {
                JobStatus::Cleaning => format!("Cleaning cancelled: {}", job.url()),
                _ => format!("Terminated by user: {}", job.url()),
            }));
            return;
        }

        let stage = job.status();
        let (terminal, message) = match &err {
            JobError::Fetch(FetchError::Unavailable { .. }) => (
                JobStatus::Skipped,
                format!("Video not available: {}", job.url()),
            ),
            JobError::Fetch(FetchError::Fatal { message }) if stage == JobStatus::Resolving => (
                JobStatus::Failed,
                format!("Could not process video {}: {message}", job.url()),
            ),
            JobError::Fetch(FetchError::Fatal { message } | FetchError::Transient { message }) => (
                JobStatus::Failed,
                format!("Subtitle download failed for {}: {message}", job.url()),
            ),
            JobError::Fetch(FetchError::NoTrackFound { .. }) => (
                JobStatus::Failed,
                format!("No subtitles found for {}", job.title().unwrap_or(job.url())),
            ),
            other => (JobStatus::Failed, format!("Unexpected error: {other}")),
        };
        engine_warn!(job = job.id(); "{} ({})", message, stage);
        job.finish_early(terminal);
        sink.emit(Event::log(message));
    }
}

/// Removes the intermediate track whatever the job's outcome.
fn discard_track(job: &Job, track: &Path) {
    if let Err(err) = fs::remove_file(track) {
        engine_warn!(job = job.id(); "could not remove track {:?}: {}", track, err);
    }
}
