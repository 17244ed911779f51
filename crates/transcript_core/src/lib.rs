//! Transcript core: pure job model, retry policy and event types.
mod event;
mod input;
mod job;
mod retry;
mod sanitize;

pub use event::Event;
pub use input::{filter_urls, parse_url_list};
pub use job::{Job, JobId, JobStatus, TransitionError};
pub use retry::{RetryDecision, RetryPolicy, RetryState, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
pub use sanitize::{sanitize_title, MAX_SAFE_NAME_LEN};
