use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use transcript_core::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};

use crate::fetch::{ErrorClassifier, FetchSettings};

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_TRANSIENT_PATTERNS: &[&str] = &["Precondition check failed", "HTTP Error 400"];
pub const DEFAULT_UNAVAILABLE_PATTERNS: &[&str] = &["Video unavailable"];

/// Engine settings. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub output_dir: PathBuf,
    /// Where intermediate subtitle tracks land; defaults to `output_dir`.
    pub work_dir: Option<PathBuf>,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub event_poll_interval_ms: u64,
    pub tool_program: String,
    pub tool_args: Vec<String>,
    pub subtitle_format: String,
    pub transient_patterns: Vec<String>,
    pub unavailable_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("transcripts"),
            work_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF.as_millis() as u64,
            event_poll_interval_ms: DEFAULT_EVENT_POLL_INTERVAL.as_millis() as u64,
            tool_program: "yt-dlp".to_string(),
            tool_args: Vec::new(),
            subtitle_format: "vtt".to_string(),
            transient_patterns: to_strings(DEFAULT_TRANSIENT_PATTERNS),
            unavailable_patterns: to_strings(DEFAULT_UNAVAILABLE_PATTERNS),
        }
    }
}

impl EngineConfig {
    pub fn default_with_output(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(&self.output_dir)
    }

    /// Worker count actually used; zero is treated as one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms.max(1))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            work_dir: self.work_dir().to_path_buf(),
            subtitle_format: self.subtitle_format.clone(),
            classifier: ErrorClassifier::new(
                self.transient_patterns.clone(),
                self.unavailable_patterns.clone(),
            ),
        }
    }
}

fn to_strings(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}
