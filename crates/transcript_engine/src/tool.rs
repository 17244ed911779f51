use std::io;
use std::path::Path;
use std::process::{Output, Stdio};

use engine_logging::{engine_debug, engine_info};
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("io error while running external tool: {0}")]
    Io(#[from] io::Error),
    #[error("cancelled")]
    Cancelled,
}

impl ToolError {
    /// Text used for error classification: stderr when the tool ran,
    /// otherwise the error message itself.
    pub fn detail(&self) -> String {
        match self {
            ToolError::Failed { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Parameters for one subtitle extraction.
#[derive(Debug, Clone, Copy)]
pub struct TrackRequest<'a> {
    pub url: &'a str,
    pub safe_name: &'a str,
    pub work_dir: &'a Path,
    pub format: &'a str,
}

/// The external subtitle extraction tool.
///
/// Implementations must return [`ToolError::Cancelled`] promptly once
/// `cancel` fires and must not start any work if it already has.
#[async_trait::async_trait]
pub trait SubtitleTool: Send + Sync {
    /// Canonical title of the media behind `url`. Side-effect free.
    async fn resolve_title(&self, url: &str, cancel: &CancellationToken)
        -> Result<String, ToolError>;

    /// Writes the auto-generated subtitle track for `request.url` into
    /// `request.work_dir`, named after `request.safe_name`.
    async fn extract_track(
        &self,
        request: TrackRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError>;
}

/// `yt-dlp` driven as a subprocess.
#[derive(Debug, Clone)]
pub struct YtDlpTool {
    program: String,
    extra_args: Vec<String>,
}

impl YtDlpTool {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args);
        cmd
    }
}

impl Default for YtDlpTool {
    fn default() -> Self {
        Self::new("yt-dlp", Vec::new())
    }
}

#[async_trait::async_trait]
impl SubtitleTool for YtDlpTool {
    async fn resolve_title(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let mut cmd = self.command();
        cmd.args(["--get-filename", "-o", "%(title)s", url]);
        let output = run_cancellable(cmd, cancel).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn extract_track(
        &self,
        request: TrackRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let template = request
            .work_dir
            .join(format!("{}.%(ext)s", request.safe_name));
        let mut cmd = self.command();
        cmd.args([
            "--skip-download",
            "--write-auto-sub",
            "--sub-format",
            request.format,
            "--output",
        ])
        .arg(template)
        .arg(request.url);
        run_cancellable(cmd, cancel).await?;
        Ok(())
    }
}

/// Runs `cmd` to completion unless `cancel` fires first.
///
/// Nothing is spawned when the token is already cancelled. On cancellation the
/// child is killed (best effort, via `kill_on_drop`) and this returns at once
/// without waiting for the process to exit. A non-zero exit becomes
/// [`ToolError::Failed`] carrying stderr.
pub async fn run_cancellable(
    mut cmd: Command,
    cancel: &CancellationToken,
) -> Result<Output, ToolError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    if cancel.is_cancelled() {
        return Err(ToolError::Cancelled);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: program.clone(),
        source,
    })?;
    engine_debug!("spawned {} (pid {:?})", program, child.id());

    let output = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            // Dropping the wait future drops the child, which kills it.
            engine_info!("terminating {} after cancellation", program);
            return Err(ToolError::Cancelled);
        }
        output = child.wait_with_output() => output?,
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
