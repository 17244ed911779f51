use serde::Serialize;

/// Message delivered from a run to its observer, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Human-readable progress or error line.
    Log { text: String },
    /// Aggregate completion count for the run.
    Progress { completed: usize, total: usize },
}

impl Event {
    pub fn log(text: impl Into<String>) -> Self {
        Event::Log { text: text.into() }
    }

    pub fn progress(completed: usize, total: usize) -> Self {
        Event::Progress { completed, total }
    }
}
