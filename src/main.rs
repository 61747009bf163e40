mod audio;
mod config;
mod error;
mod pipeline;
mod playlist;
#[cfg_attr(
    not(all(feature = "alsa-capture", feature = "lame")),
    allow(dead_code)
)]
mod recorder;
mod segment;
mod state_machine;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Log level from RUST_LOG
    env_logger::init();

    // Compiled-in defaults, then command-line overrides
    let mut config = Config::new()?;
    config.apply(Cli::parse());
    config.validate()?;

    std::fs::create_dir_all(&config.output_directory).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_directory.display()
        )
    })?;

    log::info!(
        "{} {} starting: level={}, intensity={}, stride={}, segments={}",
        env!("APP_NAME"),
        env!("APP_VERSION"),
        config.level_threshold,
        config.intensity_threshold,
        config.detector_stride,
        config.segment_limit,
    );

    run(config).await
}

#[cfg(all(feature = "alsa-capture", feature = "lame"))]
async fn run(config: Config) -> Result<()> {
    use audio::LoudEvent;
    use recorder::SegmentRecorder;
    use tokio::signal;
    use tokio::sync::{mpsc, oneshot};

    let (loud_tx, mut loud_rx) = mpsc::channel::<LoudEvent>(16);
    let (done_tx, mut done_rx) = oneshot::channel();

    let mut recorder = SegmentRecorder::start(config, loud_tx, done_tx)?;
    let mut stop_requested = false;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                if stop_requested {
                    recorder.abandon();
                    anyhow::bail!("Interrupted twice, abandoning segment in flight");
                }
                log::info!("Received Ctrl+C, stopping after the current segment...");
                recorder.request_stop();
                stop_requested = true;
            }

            Some(event) = loud_rx.recv() => {
                log::warn!(
                    "Noise detected in segment {} ({} loud samples)",
                    event.sequence_number,
                    event.verdict.exceed_count
                );
            }

            result = &mut done_rx => {
                let summary = result.context("Segmenter thread exited without a result")??;
                log::info!(
                    "Recorded {} segments ({} loud, {} issues)",
                    summary.segments,
                    summary.loud_segments,
                    summary.issues
                );
                break;
            }
        }
    }

    recorder.stop();
    log::info!("Successfully closed");
    Ok(())
}

#[cfg(not(all(feature = "alsa-capture", feature = "lame")))]
async fn run(_config: Config) -> Result<()> {
    anyhow::bail!("hlsrec was built without the `alsa-capture` and `lame` features")
}
