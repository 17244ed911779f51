use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Whole-line cue markers: bare timestamp/arrow runs (also covers numeric cue
/// ids) and `start --> end` timing lines with optional cue settings.
static CUE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[0-9:.,\->]+|(?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3}\s*-->\s*(?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3}(?:\s+.*)?)$",
    )
    .expect("cue marker regex is valid")
});

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup regex is valid"));

/// `Kind: captions` style metadata inside the header block.
static HEADER_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*:\s*\S").expect("header regex is valid"));

const HEADER_TOKEN: &str = "WEBVTT";

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("cleaning cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub trait TranscriptCleaner: Send + Sync {
    /// Plain transcript lines in track order. Checks `cancel` once per line.
    fn clean(
        &self,
        reader: &mut dyn BufRead,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CleanError>;

    fn clean_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CleanError> {
        let mut reader = BufReader::new(File::open(path)?);
        self.clean(&mut reader, cancel)
    }
}

/// Strips WebVTT headers, timing lines and inline tags. Lines are never
/// merged, reordered or deduplicated.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebVttCleaner;

impl TranscriptCleaner for WebVttCleaner {
    fn clean(
        &self,
        reader: &mut dyn BufRead,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CleanError> {
        let mut lines = Vec::new();
        let mut in_header = false;

        for line in reader.lines() {
            if cancel.is_cancelled() {
                return Err(CleanError::Cancelled);
            }
            let line = line?;
            let trimmed = line.trim_start_matches('\u{feff}').trim();

            if trimmed.is_empty() {
                in_header = false;
                continue;
            }
            if is_header_token(trimmed) {
                in_header = true;
                continue;
            }
            if CUE_MARKER.is_match(trimmed) {
                in_header = false;
                continue;
            }
            if in_header && HEADER_FIELD.is_match(trimmed) {
                continue;
            }
            in_header = false;

            let text = MARKUP_TAG.replace_all(trimmed, "");
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }

        Ok(lines)
    }
}

fn is_header_token(line: &str) -> bool {
    line.strip_prefix(HEADER_TOKEN)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}
