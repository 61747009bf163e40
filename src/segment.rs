//! Segment records and buffer sizing.

use std::path::PathBuf;

use crate::error::PipelineError;

/// Shortest segment the recorder accepts, in seconds.
pub const MIN_SEGMENT_SECONDS: f64 = 0.5;

/// Fixed slack LAME needs on top of 1.25 bytes per sample. Must match the
/// encoder in use.
pub const ENCODER_SLACK_BYTES: usize = 7200;

/// Longest segment the recorder accepts, in samples (about 6 minutes at
/// 44.1 kHz).
pub const MAX_SEGMENT_SAMPLES: usize = 16 * 1024 * 1024;

/// Buffer capacities derived from the segment duration and sample rate.
///
/// Both buffers are always allocated from one `SegmentSizing` value, never
/// resized separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSizing {
    /// Samples captured per segment.
    pub sample_capacity: usize,
    /// Worst-case encoded bytes for `sample_capacity` samples.
    pub encoded_capacity: usize,
}

impl SegmentSizing {
    pub fn compute(segment_seconds: f64, sample_rate: u32) -> Result<Self, PipelineError> {
        if !segment_seconds.is_finite() || segment_seconds < MIN_SEGMENT_SECONDS {
            return Err(PipelineError::InvalidConfiguration(format!(
                "segment duration must be at least {MIN_SEGMENT_SECONDS}s, got {segment_seconds}"
            )));
        }
        if sample_rate == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "sample rate must be positive".to_string(),
            ));
        }

        let samples = (segment_seconds * f64::from(sample_rate)).round();
        if samples > MAX_SEGMENT_SAMPLES as f64 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "segment too long: {segment_seconds}s at {sample_rate}Hz"
            )));
        }
        let sample_capacity = samples as usize;
        // ceil(1.25 * n) in integer arithmetic
        let encoded_capacity = (sample_capacity * 5).div_ceil(4) + ENCODER_SLACK_BYTES;

        Ok(Self {
            sample_capacity,
            encoded_capacity,
        })
    }

    /// Allocates a matching pair of PCM and encoded-output buffers. The
    /// encoded buffer starts empty with its capacity reserved.
    pub fn allocate(&self) -> (Vec<i16>, Vec<u8>) {
        (
            vec![0i16; self.sample_capacity],
            Vec::with_capacity(self.encoded_capacity),
        )
    }
}

/// One finalized segment. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub sequence_number: u64,
    pub sample_count: usize,
    pub duration_seconds: f64,
    pub file_path: PathBuf,
}

/// File name of a segment, shared by the on-disk file and its playlist URI.
pub fn segment_file_name(name_template: &str, sequence_number: u64, extension: &str) -> String {
    format!("{name_template}-{sequence_number}.{extension}")
}
