// Integration tests for recovery buffer retention
//
// Drives RecoveryBuffer directly through several rotation cycles and checks
// what survives on disk.

use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use voice_capture::{RecoveryBuffer, MAX_RECOVERY_FILES};

fn chunk(marker: u8) -> Arc<[u8]> {
    Arc::from(vec![marker; 64])
}

#[test]
fn test_retention_after_many_rotations() {
    let dir = TempDir::new().unwrap();
    let mut buffer = RecoveryBuffer::new(dir.path());
    buffer.start().unwrap();

    for marker in 1..=5u8 {
        buffer.push(chunk(marker));
        buffer.rotate().unwrap();
    }

    let mut files = buffer.list_files().unwrap();
    assert_eq!(files.len(), MAX_RECOVERY_FILES);

    files.sort_by(|a, b| a.path.cmp(&b.path));
    let contents: Vec<Vec<u8>> = files.iter().map(|f| fs::read(&f.path).unwrap()).collect();
    assert_eq!(contents, vec![vec![4; 64], vec![5; 64]]);
}

#[test]
fn test_final_stop_respects_retention() {
    let dir = TempDir::new().unwrap();
    let mut buffer = RecoveryBuffer::new(dir.path());
    buffer.start().unwrap();

    for marker in 1..=2u8 {
        buffer.push(chunk(marker));
        buffer.rotate().unwrap();
    }
    buffer.push(chunk(3));
    buffer.stop().unwrap();

    let files = buffer.list_files().unwrap();
    assert_eq!(files.len(), MAX_RECOVERY_FILES);
    assert!(files
        .iter()
        .any(|f| fs::read(&f.path).unwrap() == vec![3; 64]));
}

#[test]
fn test_recent_includes_files_then_pending() {
    let dir = TempDir::new().unwrap();
    let mut buffer = RecoveryBuffer::new(dir.path());
    buffer.start().unwrap();

    buffer.push(chunk(1));
    buffer.rotate().unwrap();
    buffer.push(chunk(2));

    let recent = buffer.recent(Duration::from_secs(300));
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0], vec![1; 64]);
    assert_eq!(recent.last().unwrap(), &vec![2; 64]);

    // A zero window still returns what has not been flushed
    let pending_only = buffer.recent(Duration::ZERO);
    assert_eq!(pending_only.last().unwrap(), &vec![2; 64]);
}

#[test]
fn test_new_session_starts_fresh_pending_list() {
    let dir = TempDir::new().unwrap();
    let mut buffer = RecoveryBuffer::new(dir.path());
    buffer.start().unwrap();
    buffer.push(chunk(1));

    buffer.start().unwrap();

    assert_eq!(buffer.pending_len(), 0);
    assert!(buffer.list_files().unwrap().is_empty());
}
