//! Transcript engine: subtitle fetching, cleaning, persistence and the
//! bounded job pool that ties them together.
mod clean;
mod config;
mod fetch;
mod job;
mod persist;
mod pool;
mod run_state;
mod sink;
mod tool;

pub use clean::{CleanError, TranscriptCleaner, WebVttCleaner};
pub use config::{
    EngineConfig, DEFAULT_CONCURRENCY, DEFAULT_EVENT_POLL_INTERVAL, DEFAULT_TRANSIENT_PATTERNS,
    DEFAULT_UNAVAILABLE_PATTERNS,
};
pub use fetch::{
    locate_track, ErrorClassifier, FetchError, FetchSettings, RawTrackFile, SubtitleFetcher,
};
pub use job::{JobError, JobRunner, FALLBACK_SAFE_NAME};
pub use persist::{ensure_output_dir, PersistError, TranscriptWriter, TRANSCRIPT_EXTENSION};
pub use pool::{JobPool, RunHandle, RunSummary};
pub use run_state::RunState;
pub use sink::{ChannelEventSink, EventSink};
pub use tool::{run_cancellable, SubtitleTool, ToolError, TrackRequest, YtDlpTool};

pub use tokio_util::sync::CancellationToken;
