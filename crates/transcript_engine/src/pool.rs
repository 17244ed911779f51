use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info};
use futures_util::FutureExt;
use tokio::sync::mpsc as async_mpsc;
use tokio_util::sync::CancellationToken;
use transcript_core::{filter_urls, Event, Job, JobStatus};

use crate::clean::WebVttCleaner;
use crate::config::{EngineConfig, DEFAULT_CONCURRENCY};
use crate::fetch::SubtitleFetcher;
use crate::job::JobRunner;
use crate::persist::TranscriptWriter;
use crate::run_state::RunState;
use crate::sink::{ChannelEventSink, EventSink};
use crate::tool::SubtitleTool;

type JobQueue = Arc<Mutex<VecDeque<Job>>>;

/// Bounded-concurrency scheduler for transcript jobs.
///
/// Each call to [`JobPool::run`] starts an independent run on its own
/// thread and runtime; nothing is shared between runs.
pub struct JobPool {
    runner: Arc<JobRunner>,
    concurrency: usize,
}

impl JobPool {
    pub fn new(runner: JobRunner, concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_default_concurrency(runner: JobRunner) -> Self {
        Self::new(runner, DEFAULT_CONCURRENCY)
    }

    /// Wires the WebVTT cleaner and an atomic writer around `tool`.
    pub fn from_config(config: &EngineConfig, tool: Arc<dyn SubtitleTool>) -> Self {
        let fetcher = SubtitleFetcher::new(tool, config.fetch_settings());
        let runner = JobRunner::new(
            fetcher,
            Arc::new(WebVttCleaner),
            TranscriptWriter::new(config.output_dir.clone()),
            config.retry_policy(),
        );
        Self::new(runner, config.effective_concurrency())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Starts a run over `urls`. Blank entries are dropped before counting.
    pub fn run<I, S>(&self, urls: I) -> RunHandle
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let jobs: Vec<Job> = filter_urls(urls)
            .into_iter()
            .enumerate()
            .map(|(id, url)| Job::new(id, url))
            .collect();
        let state = Arc::new(RunState::new(jobs.len(), CancellationToken::new()));
        let (event_tx, event_rx) = mpsc::channel();

        let runner = Arc::clone(&self.runner);
        let concurrency = self.concurrency;
        let run_state = Arc::clone(&state);
        let thread = thread::spawn(move || {
            let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(concurrency)
                .thread_name("transcript-worker")
                .enable_all()
                .build();
            match runtime {
                Ok(runtime) => {
                    runtime.block_on(drive_run(runner, jobs, concurrency, run_state, sink))
                }
                Err(err) => {
                    engine_error!("could not start job runtime: {}", err);
                    sink.emit(Event::log(format!(
                        "Unexpected error: could not start workers: {err}"
                    )));
                    abandon_run(jobs, &run_state, JobStatus::Failed)
                }
            }
        });

        RunHandle {
            event_rx,
            state,
            thread: Some(thread),
        }
    }
}

/// Caller's side of a run: event stream, progress snapshot and cancellation.
pub struct RunHandle {
    event_rx: mpsc::Receiver<Event>,
    state: Arc<RunState>,
    thread: Option<thread::JoinHandle<RunSummary>>,
}

impl RunHandle {
    pub fn try_recv(&self) -> Option<Event> {
        self.event_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event, then drains whatever else is
    /// queued. `None` once the run has ended and every event was consumed.
    pub fn poll_events(&self, timeout: Duration) -> Option<Vec<Event>> {
        let mut batch = Vec::new();
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => batch.push(event),
            Err(RecvTimeoutError::Timeout) => return Some(batch),
            Err(RecvTimeoutError::Disconnected) => return None,
        }
        batch.extend(self.event_rx.try_iter());
        Some(batch)
    }

    /// Blocking iterator over events; ends when the run is over.
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.event_rx.iter()
    }

    /// Requests cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        engine_info!("cancellation requested");
        self.state.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.cancellation_token().clone()
    }

    pub fn total(&self) -> usize {
        self.state.total()
    }

    pub fn completed(&self) -> usize {
        self.state.completed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// All jobs accounted for, or cancellation requested.
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Blocks until the run thread exits and returns its summary.
    pub fn wait(mut self) -> thread::Result<RunSummary> {
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Err(Box::new("run already joined")),
        }
    }
}

/// Final state of every job in a run, ordered by input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs: Vec<Job>,
    pub total: usize,
    pub completed: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status() == status).count()
    }

    pub fn job(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id() == id)
    }

    /// Every job reached a completed status, even if a cancel arrived late.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

async fn drive_run(
    runner: Arc<JobRunner>,
    jobs: Vec<Job>,
    concurrency: usize,
    state: Arc<RunState>,
    sink: Arc<dyn EventSink>,
) -> RunSummary {
    let total = jobs.len();
    engine_info!("run started: {} jobs, {} workers", total, concurrency);
    sink.emit(Event::progress(0, total));

    let queue: JobQueue = Arc::new(Mutex::new(VecDeque::from(jobs)));
    let (done_tx, mut done_rx) = async_mpsc::unbounded_channel::<Job>();

    let workers: Vec<_> = (0..concurrency.min(total))
        .map(|worker| {
            tokio::spawn(worker_loop(
                worker,
                Arc::clone(&runner),
                Arc::clone(&queue),
                state.cancellation_token().clone(),
                Arc::clone(&sink),
                done_tx.clone(),
            ))
        })
        .collect();
    drop(done_tx);

    // Single aggregator: progress events leave in counter order.
    let mut finished = Vec::with_capacity(total);
    while let Some(job) = done_rx.recv().await {
        if job.status().counts_as_completed() {
            match state.record_completion() {
                Some(completed) => sink.emit(Event::progress(completed, total)),
                None => engine_error!(job = job.id(); "completion counted twice"),
            }
        }
        finished.push(job);
    }
    for worker in workers {
        if let Err(err) = worker.await {
            engine_error!("worker task ended abnormally: {}", err);
        }
    }

    let leftover: Vec<Job> = lock_queue(&queue).drain(..).collect();
    let mut summary = abandon_run(leftover, &state, JobStatus::Cancelled);
    summary.jobs.extend(finished);
    summary.jobs.sort_by_key(Job::id);

    if summary.is_complete() {
        sink.emit(Event::progress(total, total));
        sink.emit(Event::log("All done!"));
    } else {
        sink.emit(Event::log(format!(
            "Run cancelled: {} of {} jobs completed.",
            summary.completed, total
        )));
    }
    engine_info!(
        "run finished: {} done, {} skipped, {} failed, {} cancelled",
        summary.count(JobStatus::Done),
        summary.count(JobStatus::Skipped),
        summary.count(JobStatus::Failed),
        summary.count(JobStatus::Cancelled)
    );
    summary
}

async fn worker_loop(
    worker: usize,
    runner: Arc<JobRunner>,
    queue: JobQueue,
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
    done_tx: async_mpsc::UnboundedSender<Job>,
) {
    loop {
        // Checked before taking work so queued jobs never start after cancel.
        if cancel.is_cancelled() {
            break;
        }
        let next = lock_queue(&queue).pop_front();
        let Some(mut job) = next else {
            break;
        };
        engine_debug!(job = job.id(); "worker {} picked up {}", worker, job.url());

        let outcome = AssertUnwindSafe(runner.run(&mut job, &cancel, sink.as_ref()))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            let reason = panic_message(panic.as_ref());
            engine_error!(job = job.id(); "job panicked: {}", reason);
            sink.emit(Event::log(format!("Unexpected error: {reason}")));
            job.finish_early(JobStatus::Failed);
        }

        if done_tx.send(job).is_err() {
            break;
        }
    }
    engine_debug!("worker {} exiting", worker);
}

/// Moves never-started jobs to `terminal` and builds a summary around them.
/// Terminal statuses that count as completed are recorded in `state`.
fn abandon_run(mut jobs: Vec<Job>, state: &RunState, terminal: JobStatus) -> RunSummary {
    for job in &mut jobs {
        job.finish_early(terminal);
        if job.status().counts_as_completed() {
            state.record_completion();
        }
    }
    RunSummary {
        jobs,
        total: state.total(),
        completed: state.completed(),
        cancelled: state.is_cancelled(),
    }
}

fn lock_queue(queue: &Mutex<VecDeque<Job>>) -> MutexGuard<'_, VecDeque<Job>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}
