use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

pub const TRANSCRIPT_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path:?} unusable: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` if needed and checks that files can be created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".into())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| unusable(e.to_string()))?;
        }
        Err(err) => return Err(unusable(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|e| unusable(e.to_string()))?;
    Ok(())
}

/// Writes one `<safe_name>.txt` per transcript.
///
/// Content goes to a temp file in the same directory which is renamed over
/// the target only once fully flushed, so a reader sees either the previous
/// file or the complete new one.
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, safe_name: &str) -> PathBuf {
        self.dir.join(format!("{safe_name}.{TRANSCRIPT_EXTENSION}"))
    }

    pub fn write_transcript(
        &self,
        safe_name: &str,
        lines: &[String],
    ) -> Result<PathBuf, PersistError> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        let target = self.path_for(safe_name);
        self.replace_atomically(&target, content.as_bytes())?;
        Ok(target)
    }

    fn replace_atomically(&self, target: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        ensure_output_dir(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file_mut().sync_all()?;
        // `persist` renames over an existing target on every platform.
        tmp.persist(target).map_err(|e| PersistError::Io(e.error))?;
        Ok(())
    }
}
