use std::fs;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use transcript_core::{filter_urls, parse_url_list};
use transcript_engine::EngineConfig;

use crate::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(name = "transcript-harvester")]
#[command(about = "Downloads auto-generated subtitles and saves them as plain-text transcripts")]
#[command(version)]
pub struct Cli {
    /// Video URLs; read from --input or stdin when omitted
    pub urls: Vec<String>,

    /// File with one URL per line
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// RON file with engine settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory receiving the transcripts
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for intermediate subtitle tracks
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Number of videos processed at once
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Subtitle tool executable
    #[arg(long)]
    pub tool: Option<String>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Where diagnostics go
    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log: LogTarget,

    #[arg(long, default_value = "transcript-harvester.log")]
    pub log_file: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
    Off,
}

impl Cli {
    pub fn log_destination(&self) -> Option<LogDestination> {
        match self.log {
            LogTarget::File => Some(LogDestination::File(self.log_file.clone())),
            LogTarget::Terminal => Some(LogDestination::Terminal),
            LogTarget::Both => Some(LogDestination::Both(self.log_file.clone())),
            LogTarget::Off => None,
        }
    }

    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = Some(dir.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(tool) = &self.tool {
            config.tool_program = tool.clone();
        }
    }

    /// Positional URLs plus `--input`; stdin only when neither was given.
    pub fn collect_urls(&self) -> Result<Vec<String>> {
        let mut urls = filter_urls(&self.urls);
        if let Some(path) = &self.input {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("could not read URL list {}", path.display()))?;
            urls.extend(parse_url_list(&raw));
        }
        if urls.is_empty() && self.input.is_none() {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                bail!("no URLs given; pass them as arguments, with --input, or on stdin");
            }
            urls = read_url_list(stdin.lock())?;
        }
        Ok(urls)
    }
}

fn read_url_list(mut reader: impl BufRead) -> Result<Vec<String>> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .context("could not read URLs from stdin")?;
    Ok(parse_url_list(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("transcript-harvester").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let cli = parse(&["-o", "out", "--concurrency", "5", "https://a.example"]);
        let mut config = EngineConfig::default();
        config.tool_program = "custom-dl".to_string();
        cli.apply_overrides(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.tool_program, "custom-dl");
        assert_eq!(config.work_dir, None);
    }

    #[test]
    fn positional_and_file_urls_are_combined() {
        let dir = tempfile::TempDir::new().unwrap();
        let list = dir.path().join("urls.txt");
        fs::write(&list, "https://b.example\n\n  https://c.example  \n").unwrap();
        let list_arg = list.to_string_lossy().into_owned();

        let cli = parse(&["https://a.example", " ", "--input", &list_arg]);
        assert_eq!(
            cli.collect_urls().unwrap(),
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
    }

    #[test]
    fn missing_input_file_is_reported() {
        let cli = parse(&["--input", "/nonexistent/urls.txt"]);
        let err = cli.collect_urls().unwrap_err();
        assert!(err.to_string().contains("could not read URL list"));
    }

    #[test]
    fn stdin_list_skips_blank_lines() {
        let input = Cursor::new("https://a.example\n\n\r\nhttps://b.example\n");
        let urls = read_url_list(input).unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn log_off_disables_logging() {
        assert!(parse(&["--log", "off"]).log_destination().is_none());
        assert!(matches!(
            parse(&[]).log_destination(),
            Some(LogDestination::File(_))
        ));
    }
}
