use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use transcript_core::{Event, RetryDecision, RetryState};

use crate::sink::EventSink;
use crate::tool::{SubtitleTool, ToolError, TrackRequest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The media is permanently gone; the job is skipped.
    #[error("not available: {message}")]
    Unavailable { message: String },
    /// A failure worth retrying. Never escapes [`SubtitleFetcher::fetch`].
    #[error("transient failure: {message}")]
    Transient { message: String },
    #[error("{message}")]
    Fatal { message: String },
    #[error("no subtitle track produced for {safe_name}")]
    NoTrackFound { safe_name: String },
    #[error("cancelled")]
    Cancelled,
}

/// Substring rules that sort external tool errors into retry classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    transient_patterns: Vec<String>,
    unavailable_patterns: Vec<String>,
}

impl ErrorClassifier {
    pub fn new(transient_patterns: Vec<String>, unavailable_patterns: Vec<String>) -> Self {
        Self {
            transient_patterns,
            unavailable_patterns,
        }
    }

    pub fn is_transient(&self, error_text: &str) -> bool {
        matches_any(&self.transient_patterns, error_text)
    }

    pub fn is_unavailable(&self, error_text: &str) -> bool {
        matches_any(&self.unavailable_patterns, error_text)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_TRANSIENT_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            crate::config::DEFAULT_UNAVAILABLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        )
    }
}

fn matches_any(patterns: &[String], text: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && text.contains(pattern.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub work_dir: PathBuf,
    pub subtitle_format: String,
    pub classifier: ErrorClassifier,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            subtitle_format: "vtt".to_string(),
            classifier: ErrorClassifier::default(),
        }
    }
}

/// Subtitle track left on disk by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTrackFile {
    pub path: PathBuf,
    pub attempts: u32,
}

pub struct SubtitleFetcher {
    tool: Arc<dyn SubtitleTool>,
    settings: FetchSettings,
}

impl SubtitleFetcher {
    pub fn new(tool: Arc<dyn SubtitleTool>, settings: FetchSettings) -> Self {
        Self { tool, settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Asks the tool for the canonical title of `url`.
    ///
    /// Failures matching an unavailable pattern become
    /// [`FetchError::Unavailable`]; everything else is fatal. Never retried.
    pub async fn resolve_title(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        match self.tool.resolve_title(url, cancel).await {
            Ok(title) => Ok(title),
            Err(ToolError::Cancelled) => Err(FetchError::Cancelled),
            Err(err) => {
                let detail = err.detail();
                if self.settings.classifier.is_unavailable(&detail) {
                    Err(FetchError::Unavailable { message: detail })
                } else {
                    Err(FetchError::Fatal { message: detail })
                }
            }
        }
    }

    /// Fetches the track for `url`, retrying transient failures.
    ///
    /// `retry` counts attempts; after the budget runs out the last transient
    /// error is returned as [`FetchError::Fatal`]. Backoff waits end early on
    /// cancellation.
    pub async fn fetch(
        &self,
        url: &str,
        safe_name: &str,
        retry: &mut RetryState,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> Result<RawTrackFile, FetchError> {
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let attempt = retry.begin_attempt();
            engine_debug!("fetch attempt {} for {}", attempt, url);

            let message = match self.fetch_once(url, safe_name, cancel).await {
                Ok(path) => return Ok(RawTrackFile { path, attempts: attempt }),
                Err(FetchError::Transient { message }) => message,
                Err(other) => return Err(other),
            };

            match retry.on_transient_failure(message.clone()) {
                RetryDecision::RetryAfter(delay) => {
                    engine_warn!("transient failure for {}: {}", url, message);
                    sink.emit(Event::log(format!(
                        "Transient error from subtitle tool (attempt {attempt}/{}). Retrying...",
                        retry.max_attempts()
                    )));
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => return Err(FetchError::Fatal { message }),
            }
        }
    }

    /// One extraction attempt plus track lookup, without retry.
    pub async fn fetch_once(
        &self,
        url: &str,
        safe_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let request = TrackRequest {
            url,
            safe_name,
            work_dir: &self.settings.work_dir,
            format: &self.settings.subtitle_format,
        };
        match self.tool.extract_track(request, cancel).await {
            Ok(()) => {}
            Err(ToolError::Cancelled) => return Err(FetchError::Cancelled),
            Err(err) => {
                let detail = err.detail();
                return Err(if self.settings.classifier.is_transient(&detail) {
                    FetchError::Transient { message: detail }
                } else {
                    FetchError::Fatal { message: detail }
                });
            }
        }

        locate_track(
            &self.settings.work_dir,
            safe_name,
            &self.settings.subtitle_format,
        )
        .ok_or_else(|| FetchError::NoTrackFound {
            safe_name: safe_name.to_string(),
        })
    }
}

/// Finds `{safe_name}.*.{format}` (or `{safe_name}.{format}`) in `dir`.
///
/// Several language variants may exist; the lexically first one wins so the
/// choice is stable.
pub fn locate_track(dir: &Path, safe_name: &str, format: &str) -> Option<PathBuf> {
    let prefix = format!("{safe_name}.");
    let suffix = format!(".{format}");
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            engine_warn!("cannot list work dir {:?}: {}", dir, err);
            return None;
        }
    };
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.len() >= prefix.len() + format.len()
                && name.starts_with(&prefix)
                && name.ends_with(&suffix)
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
