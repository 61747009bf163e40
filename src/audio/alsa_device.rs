//! ALSA PCM capture device.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

use super::capture::CaptureSource;
use crate::error::CaptureError;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Actual number of channels
    pub channels: u32,
    /// Period size in frames
    pub period_size: usize,
}

/// Blocking ALSA capture handle.
pub struct AlsaCapture {
    pcm: PCM,
    params: AlsaParams,
}

impl AlsaCapture {
    /// Open `device` for capture, S16_LE interleaved, at the rate nearest to
    /// `sample_rate`.
    pub fn open(device: &str, sample_rate: u32, channels: u32) -> Result<Self> {
        let pcm = PCM::new(device, Direction::Capture, false)
            .with_context(|| format!("Failed to open PCM device '{}' for Capture", device))?;

        {
            let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
            hwp.set_access(Access::RWInterleaved)
                .context("Failed to set access type")?;
            hwp.set_format(Format::S16LE)
                .context("Failed to set sample format")?;
            hwp.set_rate_near(sample_rate, ValueOr::Nearest)
                .context("Failed to set sample rate")?;
            hwp.set_channels(channels)
                .context("Failed to set channel count")?;
            pcm.hw_params(&hwp).context("Failed to set hw params")?;
        }

        // Read back actual negotiated parameters
        let (actual_rate, actual_channels, period_size) = {
            let hwp = pcm.hw_params_current()?;
            let rate = hwp.get_rate()?;
            let ch = hwp.get_channels()?;
            let ps = hwp.get_period_size()? as usize;
            (rate, ch, ps)
        };

        pcm.prepare()
            .context("Failed to prepare audio interface for use")?;

        let params = AlsaParams {
            sample_rate: actual_rate,
            channels: actual_channels,
            period_size,
        };

        log::info!(
            "ALSA Capture: device={}, rate={}, channels={}, period_size={}",
            device,
            actual_rate,
            actual_channels,
            period_size,
        );

        Ok(Self { pcm, params })
    }

    pub fn params(&self) -> &AlsaParams {
        &self.params
    }
}

impl CaptureSource for AlsaCapture {
    fn read(&mut self, buf: &mut [i16]) -> Result<(), CaptureError> {
        let channels = self.params.channels.max(1) as usize;
        let io = self
            .pcm
            .io_i16()
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        // readi may return early on signals; keep reading until the buffer is
        // full or the device gives nothing back.
        let mut filled = 0;
        while filled < buf.len() {
            match io.readi(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(frames) => filled += frames * channels,
                Err(e) => return Err(CaptureError::Device(e.to_string())),
            }
        }

        if filled != buf.len() {
            return Err(CaptureError::ShortRead {
                expected: buf.len(),
                got: filled,
            });
        }
        Ok(())
    }
}
