//! Tests for error types

use std::error::Error as _;

use track_ml::{Error, TrialState};

#[test]
fn test_already_initialized_error() {
    let error_str = format!("{}", Error::AlreadyInitialized);
    assert!(error_str.contains("already exists"));
    assert!(error_str.contains("shutdown()"));
}

#[test]
fn test_not_initialized_error() {
    let error_str = format!("{}", Error::NotInitialized);
    assert!(error_str.contains("No trial exists"));
    assert!(error_str.contains("init()"));
}

#[test]
fn test_invalid_state_error() {
    let error = Error::InvalidState {
        expected: TrialState::Started,
        actual: TrialState::Closed,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Started"));
    assert!(error_str.contains("Closed"));
}

#[test]
fn test_directory_error_keeps_source() {
    let error = Error::Directory {
        path: "/root/forbidden".into(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    };
    assert!(format!("{error}").contains("/root/forbidden"));
    assert!(error.source().is_some());
}

#[test]
fn test_serialization_error_names_codec() {
    let error = Error::Serialization {
        obj_name: "model".to_string(),
        serializer: "json",
        source: "float is NaN".into(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("'model'"));
    assert!(error_str.contains("json"));
    assert!(error_str.contains("NaN"));
}

#[test]
fn test_non_monotonic_iteration_error() {
    let error = Error::NonMonotonicIteration { last: 10, got: 3 };
    let error_str = format!("{error}");
    assert!(error_str.contains("10"));
    assert!(error_str.contains('3'));
}

#[test]
fn test_sync_error() {
    let error = Error::Sync {
        remote: "/mnt/share".to_string(),
        source: Box::new(Error::Io(std::io::Error::other("disk full"))),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("/mnt/share"));
    assert!(error_str.contains("disk full"));
    assert!(error_str.contains("re-synced"));

    let source = error.source().expect("sync error keeps its cause");
    assert_eq!(source.to_string(), "IO error: disk full");
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error: Error = io.into();
    assert!(matches!(error, Error::Io(_)));
    assert!(format!("{error}").contains("IO error"));
}
