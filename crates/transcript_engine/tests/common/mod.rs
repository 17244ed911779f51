#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Once};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use transcript_core::Event;
use transcript_engine::{EngineConfig, EventSink, JobPool, SubtitleTool, ToolError, TrackRequest};

pub const SAMPLE_VTT: &str = "WEBVTT
Kind: captions
Language: en

00:00:00.000 --> 00:00:02.000 align:start position:0%
hello<00:00:00.500><c> world</c>

00:00:02.000 --> 00:00:04.000 align:start position:0%
hello world
second <i>line</i>
";

pub const SAMPLE_TRANSCRIPT: &[&str] = &["hello world", "hello world", "second line"];

pub const TRANSIENT_STDERR: &str = "ERROR: [youtube] a: Precondition check failed.";
pub const UNAVAILABLE_STDERR: &str = "ERROR: [youtube] b: Video unavailable. This video is private";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// What the fake tool does for one extraction call.
#[derive(Debug, Clone)]
pub enum Extract {
    /// Writes `<safe_name>.en.<format>` with this content.
    Track(String),
    /// Same as `Track` but with arbitrary bytes.
    TrackBytes(Vec<u8>),
    /// Exits non-zero with this stderr.
    Fail(String),
    /// Reports success without producing a file.
    Nothing,
    /// Runs until cancelled.
    BlockUntilCancelled,
    Panic,
}

/// Scripted stand-in for the external subtitle tool.
#[derive(Default)]
pub struct ScriptedTool {
    titles: HashMap<String, Result<String, String>>,
    extracts: Mutex<HashMap<String, VecDeque<Extract>>>,
    extract_delay: Duration,
    started_tx: Mutex<Option<mpsc::Sender<String>>>,
    extract_starts: Mutex<Vec<(String, Instant)>>,
    track_names: Mutex<Vec<String>>,
    pub extract_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, url: &str, title: &str) -> Self {
        self.titles.insert(url.to_string(), Ok(title.to_string()));
        self
    }

    pub fn with_title_error(mut self, url: &str, stderr: &str) -> Self {
        self.titles.insert(url.to_string(), Err(stderr.to_string()));
        self
    }

    pub fn with_extracts(self, url: &str, steps: Vec<Extract>) -> Self {
        self.extracts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into());
        self
    }

    pub fn with_extract_delay(mut self, delay: Duration) -> Self {
        self.extract_delay = delay;
        self
    }

    /// Receives each URL as its extraction starts.
    pub fn notify_started(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel();
        *self.started_tx.lock().unwrap() = Some(tx);
        rx
    }

    pub fn calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn starts_for(&self, url: &str) -> Vec<Instant> {
        self.extract_starts
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Track names requested by extraction calls, in call order.
    pub fn track_names(&self) -> Vec<String> {
        self.track_names.lock().unwrap().clone()
    }

    fn next_step(&self, url: &str) -> Extract {
        self.extracts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Extract::Track(SAMPLE_VTT.to_string()))
    }
}

fn failed(stderr: &str) -> ToolError {
    ToolError::Failed {
        program: "fake-tool".to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

fn write_track(request: TrackRequest<'_>, bytes: &[u8]) -> Result<(), ToolError> {
    let name = format!("{}.en.{}", request.safe_name, request.format);
    std::fs::write(request.work_dir.join(name), bytes)?;
    Ok(())
}

#[async_trait::async_trait]
impl SubtitleTool for ScriptedTool {
    async fn resolve_title(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        match self.titles.get(url) {
            Some(Ok(title)) => Ok(title.clone()),
            Some(Err(stderr)) => Err(failed(stderr)),
            None => Ok(format!("Title for {url}")),
        }
    }

    async fn extract_track(
        &self,
        request: TrackRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.extract_starts
            .lock()
            .unwrap()
            .push((request.url.to_string(), Instant::now()));
        self.track_names
            .lock()
            .unwrap()
            .push(request.safe_name.to_string());
        if let Some(tx) = self.started_tx.lock().unwrap().as_ref() {
            let _ = tx.send(request.url.to_string());
        }

        let step = self.next_step(request.url);
        let delay = self.extract_delay;
        let result: Result<(), ToolError> = async {
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ToolError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            match step {
                Extract::Track(content) => write_track(request, content.as_bytes()),
                Extract::TrackBytes(bytes) => write_track(request, &bytes),
                Extract::Fail(stderr) => Err(failed(&stderr)),
                Extract::Nothing => Ok(()),
                Extract::BlockUntilCancelled => {
                    cancel.cancelled().await;
                    Err(ToolError::Cancelled)
                }
                Extract::Panic => panic!("scripted tool panic"),
            }
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Event> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn log_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Log { text } => Some(text.clone()),
            Event::Progress { .. } => None,
        })
        .collect()
}

pub fn progress(events: &[Event]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress { completed, total } => Some((*completed, *total)),
            Event::Log { .. } => None,
        })
        .collect()
}

/// Intermediate subtitle tracks still present in `dir`.
pub fn leftover_tracks(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".vtt"))
        .collect();
    names.sort();
    names
}

pub fn test_config(dir: &Path, concurrency: usize, backoff: Duration) -> EngineConfig {
    EngineConfig {
        concurrency,
        backoff_ms: backoff.as_millis() as u64,
        ..EngineConfig::default_with_output(dir)
    }
}

pub fn pool(tool: Arc<ScriptedTool>, dir: &Path, concurrency: usize) -> JobPool {
    JobPool::from_config(
        &test_config(dir, concurrency, Duration::from_millis(20)),
        tool,
    )
}
