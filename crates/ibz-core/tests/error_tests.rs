use std::path::PathBuf;

use ibz_core::{ErrorKind, IbzError};

#[test]
fn converts_io_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let ibz_error: IbzError = io_error.into();

    match ibz_error {
        IbzError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn converts_anyhow_error() {
    let anyhow_error = anyhow::anyhow!("boom");
    let ibz_error: IbzError = anyhow_error.into();

    match ibz_error {
        IbzError::Other(err) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn context_keeps_error_kind() {
    let err = IbzError::FormatIncompatible("invalid container signature")
        .with_context("while opening container");

    assert_eq!(err.kind(), ErrorKind::FormatIncompatible);
    match err {
        IbzError::Context { context, source } => {
            assert_eq!(context, "while opening container");
            assert!(matches!(*source, IbzError::FormatIncompatible(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn kinds_map_to_exit_codes() {
    let cases = [
        (IbzError::SourceNotFound(PathBuf::from("a")), 2, "File does not exist"),
        (IbzError::InvalidDestinationName(PathBuf::from("b?")), 3, "Invalid file name"),
        (IbzError::FormatIncompatible("bad"), 4, "File is not compatible"),
        (IbzError::TruncatedRecord { offset: 4 }, 1, "Internal error. File may be corrupted"),
        (IbzError::WorkerPanicked("boom".into()), 1, "Internal error. File may be corrupted"),
    ];

    for (error, code, message) in cases {
        assert_eq!(error.kind().exit_code(), code, "{error}");
        assert_eq!(error.kind().describe(), message);
    }
}

#[test]
fn cancellation_is_recognized_through_context() {
    assert!(IbzError::Cancelled.with_context("enqueue").is_cancelled());
    assert!(!IbzError::CompressionError("x".into()).is_cancelled());
}
