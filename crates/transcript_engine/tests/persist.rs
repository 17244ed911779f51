use std::fs;

use tempfile::TempDir;
use transcript_engine::{ensure_output_dir, PersistError, TranscriptWriter};

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("transcripts").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn rejects_file_as_output_dir() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let err = ensure_output_dir(&file_path).unwrap_err();
    assert!(matches!(err, PersistError::OutputDir { .. }));
}

#[test]
fn writes_one_line_per_entry_named_after_safe_name() {
    let temp = TempDir::new().unwrap();
    let writer = TranscriptWriter::new(temp.path().join("out"));

    let path = writer
        .write_transcript("My_Talk", &lines(&["first", "second"]))
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "My_Talk.txt");
    assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}

#[test]
fn rewrite_replaces_previous_transcript() {
    let temp = TempDir::new().unwrap();
    let writer = TranscriptWriter::new(temp.path().to_path_buf());

    let first = writer.write_transcript("doc", &lines(&["hello"])).unwrap();
    let second = writer.write_transcript("doc", &lines(&["world"])).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world\n");
}

#[test]
fn empty_transcript_writes_empty_file() {
    let temp = TempDir::new().unwrap();
    let writer = TranscriptWriter::new(temp.path().to_path_buf());
    let path = writer.write_transcript("silent", &[]).unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = TranscriptWriter::new(file_path.clone());
    let result = writer.write_transcript("doc", &lines(&["data"]));
    assert!(result.is_err());
    assert!(!file_path.with_file_name("doc.txt").exists());
}

#[test]
fn leaves_no_temp_files_behind() {
    let temp = TempDir::new().unwrap();
    let writer = TranscriptWriter::new(temp.path().to_path_buf());
    writer.write_transcript("a", &lines(&["x"])).unwrap();
    writer.write_transcript("b", &lines(&["y"])).unwrap();

    let mut names: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}
