//! Integration test for file logging.
//!
//! Lives in its own test binary because `init` installs the global subscriber.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::fs;

use hud_runtime::logging::{self, log_file_path};

#[test]
fn test_init_creates_log_file_and_closes_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");
    fs::create_dir_all(&log_dir).unwrap();
    fs::write(log_file_path(&log_dir), vec![b'x'; (logging::MAX_LOG_BYTES + 1) as usize]).unwrap();

    let guard = logging::init(&log_dir, true).unwrap();
    assert_eq!(guard.path(), log_file_path(&log_dir));
    tracing::warn!("written after init");
    guard.close();

    assert!(log_file_path(&log_dir).exists());
    let rotated = fs::metadata(log_dir.join("hud.log.1")).unwrap();
    assert_eq!(rotated.len(), logging::MAX_LOG_BYTES + 1);

    // A second global subscriber is refused, not a panic
    assert!(logging::init(&log_dir, false).is_err());
}
