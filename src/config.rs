use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use crate::error::PipelineError;
use crate::segment::SegmentSizing;

/// Recorder configuration. Fixed once the pipeline starts; the only runtime
/// change goes through `SegmentPipeline::reconfigure`.
#[derive(Debug, Clone)]
pub struct Config {
    // Capture
    pub device: String,
    pub sample_rate: u32,
    pub channels: u32,

    // Segmenting
    pub segment_seconds: f64,
    /// Number of segments to record, 0 = until interrupted.
    pub segment_limit: u64,

    // Loudness detector
    pub level_threshold: i32,
    pub intensity_threshold: u32,
    pub detector_stride: usize,
    pub positive_only: bool,

    // Encoder
    pub bitrate_kbps: u32,
    pub quality: u8,

    // Publishing
    pub output_directory: PathBuf,
    pub base_url: String,
    pub name_template: String,
    pub playlist_name: String,
}

/// Command-line overrides for the compiled-in defaults of config.toml.
#[derive(Debug, Default, Parser)]
#[command(name = "hlsrec", version, about = "Record audio into a rolling HLS playlist")]
pub struct Cli {
    /// ALSA capture device (e.g. hw:0,0)
    pub device: Option<String>,

    /// Sample amplitude above which a sample counts as loud
    #[arg(short = 'l', long = "level")]
    pub level: Option<i32>,

    /// Loud samples per segment needed to report a loud event
    #[arg(short = 'i', long = "intensity")]
    pub intensity: Option<u32>,

    /// Duration of one segment in seconds
    #[arg(short = 's', long = "segment-seconds")]
    pub segment_seconds: Option<f64>,

    /// Requested capture sample rate in Hz
    #[arg(short = 'r', long = "sample-rate")]
    pub sample_rate: Option<u32>,

    /// Stop after this many segments (0 = run until interrupted)
    #[arg(short = 'n', long = "segments")]
    pub segments: Option<u64>,

    /// Directory receiving segment files and the playlist
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// URL under which the output directory is served
    #[arg(short = 'u', long = "base-url")]
    pub base_url: Option<String>,

    /// Segment file name prefix
    #[arg(long = "name")]
    pub name: Option<String>,

    /// Inspect every Nth sample when detecting loudness
    #[arg(long = "stride")]
    pub stride: Option<usize>,

    /// Ignore negative excursions when detecting loudness
    #[arg(long = "positive-only")]
    pub positive_only: bool,

    /// MP3 bitrate in kbit/s
    #[arg(long = "bitrate")]
    pub bitrate: Option<u32>,

    /// LAME quality, 0 (best) to 9 (worst)
    #[arg(long = "quality")]
    pub quality: Option<u8>,
}

impl Config {
    /// Defaults compiled in from config.toml by build.rs.
    pub fn new() -> Result<Self> {
        Ok(Self {
            device: env!("CAPTURE_DEVICE").to_string(),
            sample_rate: env!("CAPTURE_SAMPLE_RATE")
                .parse()
                .context("Failed to parse CAPTURE_SAMPLE_RATE")?,
            channels: env!("CAPTURE_CHANNELS")
                .parse()
                .context("Failed to parse CAPTURE_CHANNELS")?,

            segment_seconds: env!("SEGMENT_SECONDS")
                .parse()
                .context("Failed to parse SEGMENT_SECONDS")?,
            segment_limit: env!("SEGMENT_LIMIT")
                .parse()
                .context("Failed to parse SEGMENT_LIMIT")?,

            level_threshold: env!("DETECTOR_LEVEL")
                .parse()
                .context("Failed to parse DETECTOR_LEVEL")?,
            intensity_threshold: env!("DETECTOR_INTENSITY")
                .parse()
                .context("Failed to parse DETECTOR_INTENSITY")?,
            detector_stride: env!("DETECTOR_STRIDE")
                .parse()
                .context("Failed to parse DETECTOR_STRIDE")?,
            positive_only: env!("DETECTOR_POSITIVE_ONLY")
                .parse()
                .context("Failed to parse DETECTOR_POSITIVE_ONLY")?,

            bitrate_kbps: env!("ENCODER_BITRATE_KBPS")
                .parse()
                .context("Failed to parse ENCODER_BITRATE_KBPS")?,
            quality: env!("ENCODER_QUALITY")
                .parse()
                .context("Failed to parse ENCODER_QUALITY")?,

            output_directory: PathBuf::from(env!("PUBLISH_OUTPUT_DIR")),
            base_url: env!("PUBLISH_BASE_URL").to_string(),
            name_template: env!("PUBLISH_NAME").to_string(),
            playlist_name: env!("PUBLISH_PLAYLIST").to_string(),
        })
    }

    /// Apply command-line overrides on top of the current values.
    pub fn apply(&mut self, cli: Cli) {
        if let Some(device) = cli.device {
            self.device = device;
        }
        if let Some(level) = cli.level {
            self.level_threshold = level;
        }
        if let Some(intensity) = cli.intensity {
            self.intensity_threshold = intensity;
        }
        if let Some(seconds) = cli.segment_seconds {
            self.segment_seconds = seconds;
        }
        if let Some(rate) = cli.sample_rate {
            self.sample_rate = rate;
        }
        if let Some(limit) = cli.segments {
            self.segment_limit = limit;
        }
        if let Some(dir) = cli.output_dir {
            self.output_directory = dir;
        }
        if let Some(url) = cli.base_url {
            self.base_url = url;
        }
        if let Some(name) = cli.name {
            self.name_template = name;
        }
        if let Some(stride) = cli.stride {
            self.detector_stride = stride;
        }
        if cli.positive_only {
            self.positive_only = true;
        }
        if let Some(bitrate) = cli.bitrate {
            self.bitrate_kbps = bitrate;
        }
        if let Some(quality) = cli.quality {
            self.quality = quality;
        }
    }

    /// Check every value the pipeline depends on before anything starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| -> Result<(), PipelineError> {
            Err(PipelineError::InvalidConfiguration(msg))
        };

        SegmentSizing::compute(self.segment_seconds, self.sample_rate)?;

        if self.channels != 1 {
            return invalid(format!(
                "only mono capture is supported, got {} channels",
                self.channels
            ));
        }
        if self.device.is_empty() {
            return invalid("capture device name is empty".to_string());
        }
        if !(0..=i32::from(i16::MAX)).contains(&self.level_threshold) {
            return invalid(format!(
                "level must be between 0 and {}, got {}",
                i16::MAX,
                self.level_threshold
            ));
        }
        if self.detector_stride == 0 {
            return invalid("detector stride must be at least 1".to_string());
        }
        if !(8..=320).contains(&self.bitrate_kbps) {
            return invalid(format!(
                "bitrate must be between 8 and 320 kbit/s, got {}",
                self.bitrate_kbps
            ));
        }
        if self.quality > 9 {
            return invalid(format!("quality must be between 0 and 9, got {}", self.quality));
        }
        if !is_plain_file_name(&self.name_template) {
            return invalid(format!(
                "segment name '{}' must be a non-empty file name",
                self.name_template
            ));
        }
        if !is_plain_file_name(&self.playlist_name) {
            return invalid(format!(
                "playlist name '{}' must be a non-empty file name",
                self.playlist_name
            ));
        }
        match Url::parse(&self.base_url) {
            Ok(url) if !url.cannot_be_a_base() => {}
            Ok(_) => return invalid(format!("base URL '{}' cannot hold paths", self.base_url)),
            Err(e) => return invalid(format!("invalid base URL '{}': {}", self.base_url, e)),
        }
        Ok(())
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.output_directory.join(&self.playlist_name)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config::new().unwrap()
    }

    #[test]
    fn compiled_defaults_are_valid() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels, 1);
        assert!(config.detector_stride >= 1);
    }

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from([
            "hlsrec", "hw:0,0", "-l", "1200", "-i", "40", "-s", "2.5", "-n", "20", "-o", "/tmp/hls",
            "--name", "nursery", "--positive-only",
        ]);
        let mut config = valid();
        config.apply(cli);

        assert_eq!(config.device, "hw:0,0");
        assert_eq!(config.level_threshold, 1200);
        assert_eq!(config.intensity_threshold, 40);
        assert_eq!(config.segment_seconds, 2.5);
        assert_eq!(config.segment_limit, 20);
        assert_eq!(config.output_directory, PathBuf::from("/tmp/hls"));
        assert_eq!(config.name_template, "nursery");
        assert!(config.positive_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_cli_keeps_defaults() {
        let mut config = valid();
        config.apply(Cli::default());
        assert_eq!(config.device, valid().device);
        assert_eq!(config.base_url, valid().base_url);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases: [fn(&mut Config); 15] = [
            |c: &mut Config| c.segment_seconds = 0.25,
            |c: &mut Config| c.segment_seconds = 1e12,
            |c: &mut Config| c.sample_rate = 0,
            |c: &mut Config| c.channels = 2,
            |c: &mut Config| c.device.clear(),
            |c: &mut Config| c.level_threshold = -1,
            |c: &mut Config| c.level_threshold = 40_000,
            |c: &mut Config| c.detector_stride = 0,
            |c: &mut Config| c.bitrate_kbps = 4,
            |c: &mut Config| c.quality = 10,
            |c: &mut Config| c.name_template = "a/b".to_string(),
            |c: &mut Config| c.name_template.clear(),
            |c: &mut Config| c.playlist_name = "..".to_string(),
            |c: &mut Config| c.base_url = "not a url".to_string(),
            |c: &mut Config| c.base_url = "data:text/plain,x".to_string(),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = valid();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(PipelineError::InvalidConfiguration(_))),
                "case {i} should be rejected"
            );
        }
    }

    #[test]
    fn huge_segment_from_cli_is_rejected() {
        let mut config = valid();
        config.apply(Cli::parse_from(["hlsrec", "-s", "1e12"]));
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn playlist_lives_in_output_directory() {
        let mut config = valid();
        config.output_directory = PathBuf::from("/srv/hls");
        config.playlist_name = "live.m3u8".to_string();
        assert_eq!(config.playlist_path(), PathBuf::from("/srv/hls/live.m3u8"));
    }
}
