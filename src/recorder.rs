//! Runs the segment pipeline on a dedicated OS thread.
//!
//! Uses std::thread (NOT a tokio task) so the blocking ALSA read never ties
//! up the async runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use tokio::sync::oneshot;

use crate::pipeline::RunSummary;

#[cfg(all(feature = "alsa-capture", feature = "lame"))]
use crate::{
    audio::{AlsaCapture, LameEncoder, LoudEvent},
    config::Config,
    pipeline::SegmentPipeline,
};

pub struct SegmentRecorder {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SegmentRecorder {
    /// Start recording.
    ///
    /// * `loud_tx` - Receives a `LoudEvent` for every loud segment
    /// * `done_tx` - Receives the run result when the thread finishes
    #[cfg(all(feature = "alsa-capture", feature = "lame"))]
    pub fn start(
        config: Config,
        loud_tx: tokio::sync::mpsc::Sender<LoudEvent>,
        done_tx: oneshot::Sender<Result<RunSummary>>,
    ) -> Result<Self> {
        log::info!(
            "SegmentRecorder starting: device=\"{}\", rate={}Hz, segment={}s, output={}",
            config.device,
            config.sample_rate,
            config.segment_seconds,
            config.output_directory.display(),
        );

        Self::spawn(
            move |running: &AtomicBool| record_thread(&config, loud_tx, running),
            done_tx,
        )
    }

    /// Run `work` on the segmenter thread and deliver its result to `done_tx`.
    fn spawn<F>(work: F, done_tx: oneshot::Sender<Result<RunSummary>>) -> Result<Self>
    where
        F: FnOnce(&AtomicBool) -> Result<RunSummary> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("hls-segmenter".into())
                .spawn(move || {
                    let result = work(&running);
                    if let Err(e) = &result {
                        log::error!("Segmenter thread error: {:#}", e);
                    }
                    let _ = done_tx.send(result);
                })?
        };

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Ask the worker to stop once the segment in flight is published.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop without waiting. The worker is detached and may still be blocked
    /// in a capture read; its result is discarded.
    pub fn abandon(mut self) {
        self.request_stop();
        if self.handle.take().is_some() {
            log::warn!("Abandoning segmenter thread with a segment in flight");
        }
    }

    /// Signal the worker to stop and wait for it.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for SegmentRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(all(feature = "alsa-capture", feature = "lame"))]
fn record_thread(
    config: &Config,
    loud_tx: tokio::sync::mpsc::Sender<LoudEvent>,
    running: &AtomicBool,
) -> Result<RunSummary> {
    // 1. Open ALSA capture device
    let capture = AlsaCapture::open(&config.device, config.sample_rate, config.channels)?;
    let actual_rate = capture.params().sample_rate;
    let actual_channels = capture.params().channels;
    if actual_channels != config.channels {
        anyhow::bail!(
            "Device '{}' negotiated {} channels, expected {}",
            config.device,
            actual_channels,
            config.channels
        );
    }

    // 2. Encoder runs at whatever rate the hardware settled on
    let encoder = LameEncoder::new(actual_rate, config.bitrate_kbps, config.quality)?;

    // 3. Pipeline, resized if the rate moved during negotiation
    let mut pipeline = SegmentPipeline::new(config, capture, encoder, loud_tx)?;
    if actual_rate != config.sample_rate {
        log::warn!(
            "Requested {}Hz, device runs at {}Hz; resizing segment buffers",
            config.sample_rate,
            actual_rate
        );
        pipeline.reconfigure(config.segment_seconds, actual_rate)?;
    }

    Ok(pipeline.run(running, config.segment_limit)?)
}
