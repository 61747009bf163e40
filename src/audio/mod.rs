//! audio - capture, loudness detection and segment encoding
//!
//! Uses ALSA for capture and LAME for MP3 encoding. The pipeline only talks
//! to the `CaptureSource` and `SegmentEncoder` traits, so both devices can be
//! swapped out.

#[cfg(feature = "alsa-capture")]
mod alsa_device;
mod capture;
mod detector;
mod encoder;

#[cfg(feature = "alsa-capture")]
pub use alsa_device::AlsaCapture;
pub use capture::CaptureSource;
pub use detector::{EventVerdict, LoudEvent, LoudnessSink, ThresholdDetector};
#[cfg(feature = "lame")]
pub use encoder::LameEncoder;
pub use encoder::SegmentEncoder;
