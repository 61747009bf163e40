//! Error taxonomy of the segment pipeline.
//!
//! `PipelineError` stops a run. `SegmentIssue` is recorded against a single
//! segment and the run carries on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that end the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("capture failed on segment {sequence}: {source}")]
    CaptureFailure {
        sequence: u64,
        #[source]
        source: CaptureError,
    },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("short read: got {got} of {expected} samples")]
    ShortRead { expected: usize, got: usize },
    #[error("capture device error: {0}")]
    Device(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encoder error: {0}")]
    Codec(String),
    #[error("encoder produced {produced} bytes, buffer holds {capacity}")]
    Overflow { produced: usize, capacity: usize },
}

/// Recoverable, per-segment failures. Logged, then the next cycle runs.
#[derive(Debug, Error)]
pub enum SegmentIssue {
    #[error("segment {sequence}: {source}")]
    EncodeFailure {
        sequence: u64,
        #[source]
        source: EncodeError,
    },
    #[error("segment {sequence}: cannot write {}: {source}", .path.display())]
    PersistFailure {
        sequence: u64,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("segment {sequence}: short write to {}: {written}/{expected} bytes", .path.display())]
    ShortWrite {
        sequence: u64,
        path: PathBuf,
        written: usize,
        expected: usize,
    },
    #[error("cannot publish playlist {}: {source}", .path.display())]
    PlaylistWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
