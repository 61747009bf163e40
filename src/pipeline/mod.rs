//! The segment pipeline: capture → detect → encode → persist → publish.
//!
//! One pipeline owns its PCM and encoded buffers, its capture source and its
//! encoder. Cycles run strictly in order on the calling thread. Only capture
//! failures end a run; anything that goes wrong with a single segment is
//! logged, recorded in the [`CycleReport`], and the stream moves on.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audio::{
    CaptureSource, EventVerdict, LoudEvent, LoudnessSink, SegmentEncoder, ThresholdDetector,
};
use crate::config::Config;
use crate::error::{EncodeError, PipelineError, SegmentIssue};
use crate::playlist::{PlaylistBuilder, PlaylistWindow};
use crate::segment::{Segment, SegmentSizing, segment_file_name};
use crate::state_machine::PipelineState;


/// Outcome of one published segment.
#[derive(Debug)]
pub struct CycleReport {
    pub segment: Segment,
    pub verdict: EventVerdict,
    pub encoded_bytes: usize,
    /// Recoverable problems hit while producing this segment.
    pub issues: Vec<SegmentIssue>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub segments: u64,
    pub loud_segments: u64,
    pub issues: u64,
}

impl RunSummary {
    fn record(&mut self, report: &CycleReport) {
        self.segments += 1;
        if report.verdict.is_loud {
            self.loud_segments += 1;
        }
        self.issues += report.issues.len() as u64;
    }
}

/// Writes one segment's bytes to its file.
type PersistFn = fn(u64, &Path, &[u8]) -> Result<(), SegmentIssue>;

pub struct SegmentPipeline<C, E, S> {
    capture: C,
    encoder: E,
    sink: S,
    detector: ThresholdDetector,
    playlist: PlaylistBuilder,
    window: PlaylistWindow,
    output_directory: PathBuf,
    name_template: String,
    segment_seconds: f64,
    sample_rate: u32,
    sizing: SegmentSizing,
    pcm: Vec<i16>,
    encoded: Vec<u8>,
    persist: PersistFn,
    next_sequence: u64,
    state: PipelineState,
}

impl<C, E, S> SegmentPipeline<C, E, S>
where
    C: CaptureSource,
    E: SegmentEncoder,
    S: LoudnessSink,
{
    pub fn new(config: &Config, capture: C, encoder: E, sink: S) -> Result<Self, PipelineError> {
        let sizing = SegmentSizing::compute(config.segment_seconds, config.sample_rate)?;
        let (pcm, encoded) = sizing.allocate();

        let playlist = PlaylistBuilder::new(
            &config.base_url,
            &config.name_template,
            encoder.extension(),
            config.segment_seconds,
            config.playlist_path(),
        )?;
        let detector = ThresholdDetector::new(
            config.level_threshold,
            config.intensity_threshold,
            config.detector_stride,
        )
        .positive_only(config.positive_only);

        Ok(Self {
            capture,
            encoder,
            sink,
            detector,
            playlist,
            window: PlaylistWindow::new(),
            output_directory: config.output_directory.clone(),
            name_template: config.name_template.clone(),
            segment_seconds: config.segment_seconds,
            sample_rate: config.sample_rate,
            sizing,
            pcm,
            encoded,
            persist: persist_segment,
            next_sequence: 0,
            state: PipelineState::Idle,
        })
    }

    /// Change segment duration and sample rate between cycles.
    ///
    /// Both buffers are replaced together. On error nothing changes.
    pub fn reconfigure(
        &mut self,
        segment_seconds: f64,
        sample_rate: u32,
    ) -> Result<(), PipelineError> {
        let sizing = SegmentSizing::compute(segment_seconds, sample_rate)?;
        let (pcm, encoded) = sizing.allocate();

        self.sizing = sizing;
        self.pcm = pcm;
        self.encoded = encoded;
        self.segment_seconds = segment_seconds;
        self.sample_rate = sample_rate;
        self.playlist.set_target_duration(segment_seconds);

        log::info!(
            "Pipeline reconfigured: {}s @ {}Hz, {} samples, {} byte output buffer",
            segment_seconds,
            sample_rate,
            sizing.sample_capacity,
            sizing.encoded_capacity
        );
        Ok(())
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn sizing(&self) -> SegmentSizing {
        self.sizing
    }

    pub fn window(&self) -> &PlaylistWindow {
        &self.window
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Run cycles until `limit` segments are published (0 = no limit) or
    /// `running` is cleared. The flag is only checked between cycles.
    pub fn run(&mut self, running: &AtomicBool, limit: u64) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        log::info!(
            "Segmenting started: {}s segments, {} samples each, limit={}",
            self.segment_seconds,
            self.sizing.sample_capacity,
            limit
        );

        while running.load(Ordering::Relaxed) {
            if limit != 0 && summary.segments >= limit {
                break;
            }
            let report = self.run_cycle()?;
            log::debug!(
                "{} ({} samples) -> {} bytes",
                report.segment.file_path.display(),
                report.segment.sample_count,
                report.encoded_bytes
            );
            summary.record(&report);
        }

        log::info!(
            "Segmenting stopped: {} segments, {} loud, {} issues",
            summary.segments,
            summary.loud_segments,
            summary.issues
        );
        Ok(summary)
    }

    /// Produce and publish exactly one segment.
    pub fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        let sequence = self.next_sequence;
        let mut issues = Vec::new();

        // Blocks for roughly one segment duration
        self.state = PipelineState::Capturing;
        if let Err(source) = self.capture.read(&mut self.pcm) {
            self.state = PipelineState::Failed;
            log::error!("Capture failed on segment {}: {}", sequence, source);
            return Err(PipelineError::CaptureFailure { sequence, source });
        }

        self.state = PipelineState::Encoding;
        let verdict = self.detector.scan(&self.pcm);
        if verdict.is_loud {
            self.sink.notify(LoudEvent {
                sequence_number: sequence,
                verdict,
            });
        }

        let encoded_bytes = match self.encode() {
            Ok(n) => n,
            Err(source) => {
                report(&mut issues, SegmentIssue::EncodeFailure { sequence, source });
                0
            }
        };

        self.state = PipelineState::Persisting;
        let file_name = segment_file_name(&self.name_template, sequence, self.encoder.extension());
        let file_path = self.output_directory.join(file_name);
        if let Err(issue) = (self.persist)(sequence, &file_path, &self.encoded[..encoded_bytes]) {
            report(&mut issues, issue);
        }

        let segment = Segment {
            sequence_number: sequence,
            sample_count: self.pcm.len(),
            duration_seconds: self.pcm.len() as f64 / f64::from(self.sample_rate),
            file_path,
        };
        self.window.push(segment.clone());
        if let Err(issue) = self.playlist.publish(&self.window) {
            report(&mut issues, issue);
        }

        self.next_sequence += 1;
        self.state = PipelineState::Published;

        log::info!(
            "Segment {} published: {} bytes, media sequence {}",
            sequence,
            encoded_bytes,
            self.window.media_sequence()
        );

        Ok(CycleReport {
            segment,
            verdict,
            encoded_bytes,
            issues,
        })
    }

    fn encode(&mut self) -> Result<usize, EncodeError> {
        let capacity = self.sizing.encoded_capacity;
        self.encoded.clear();
        self.encoder.encode(&self.pcm, &mut self.encoded)?;

        let produced = self.encoded.len();
        if produced > capacity {
            self.encoded.clear();
            return Err(EncodeError::Overflow { produced, capacity });
        }
        Ok(produced)
    }

    #[cfg(test)]
    fn with_persist(mut self, persist: PersistFn) -> Self {
        self.persist = persist;
        self
    }
}

fn report(issues: &mut Vec<SegmentIssue>, issue: SegmentIssue) {
    log::error!("{}", issue);
    issues.push(issue);
}

/// Write `bytes` to a freshly created file. A partial write is reported as
/// `ShortWrite`, the segment is still published.
fn persist_segment(sequence: u64, path: &Path, bytes: &[u8]) -> Result<(), SegmentIssue> {
    let mut file = File::create(path).map_err(|source| SegmentIssue::PersistFailure {
        sequence,
        path: path.to_path_buf(),
        source,
    })?;
    write_segment(&mut file, sequence, path, bytes)
}

fn write_segment<W: Write>(
    out: &mut W,
    sequence: u64,
    path: &Path,
    bytes: &[u8],
) -> Result<(), SegmentIssue> {
    let mut written = 0;
    while written < bytes.len() {
        match out.write(&bytes[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) if written == 0 => {
                return Err(SegmentIssue::PersistFailure {
                    sequence,
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(_) => break,
        }
    }

    if written != bytes.len() {
        return Err(SegmentIssue::ShortWrite {
            sequence,
            path: path.to_path_buf(),
            written,
            expected: bytes.len(),
        });
    }
    Ok(())
}
