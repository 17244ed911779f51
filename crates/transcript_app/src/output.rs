use std::io::{self, Write};

use transcript_core::{Event, JobStatus};
use transcript_engine::RunSummary;

/// Prints run events either as plain lines or as JSON lines.
pub struct EventPrinter<W> {
    out: W,
    json: bool,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn print(&mut self, event: &Event) -> io::Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, event)?;
            writeln!(self.out)?;
        } else {
            match event {
                Event::Log { text } => writeln!(self.out, "{text}")?,
                Event::Progress { completed, total } => {
                    writeln!(self.out, "[{completed}/{total}]")?
                }
            }
        }
        self.out.flush()
    }

    pub fn print_summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let line = format!(
            "{} done, {} skipped, {} failed, {} cancelled",
            summary.count(JobStatus::Done),
            summary.count(JobStatus::Skipped),
            summary.count(JobStatus::Failed),
            summary.count(JobStatus::Cancelled)
        );
        if self.json {
            // Keep stdout a clean JSON stream.
            eprintln!("{line}");
            Ok(())
        } else {
            writeln!(self.out, "{line}")?;
            self.out.flush()
        }
    }
}
