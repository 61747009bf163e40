//! Segment encoders.
//!
//! The pipeline only sees [`SegmentEncoder`]; the LAME implementation keeps
//! one encoder alive across segments so MP3 frames stay continuous.

use crate::error::EncodeError;

/// Compresses one segment of PCM into a caller-provided buffer.
pub trait SegmentEncoder {
    /// Append the encoded form of `pcm` to `out`.
    ///
    /// `out` arrives empty, with the encoded capacity derived for
    /// `pcm.len()` samples already reserved.
    fn encode(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<(), EncodeError>;

    /// File extension of the produced segments.
    fn extension(&self) -> &'static str;
}

#[cfg(feature = "lame")]
pub use self::lame::LameEncoder;

#[cfg(feature = "lame")]
mod lame {
    use anyhow::{Result, anyhow};
    use mp3lame_encoder::{Bitrate, Builder, Encoder, MonoPcm, Quality};

    use super::SegmentEncoder;
    use crate::error::EncodeError;

    /// Mono MP3 encoder backed by LAME.
    pub struct LameEncoder {
        encoder: Encoder,
    }

    impl LameEncoder {
        /// * `sample_rate`  - Negotiated capture rate
        /// * `bitrate_kbps` - Constant bitrate (e.g. 128)
        /// * `quality`      - LAME quality, 0 = best, 9 = worst
        pub fn new(sample_rate: u32, bitrate_kbps: u32, quality: u8) -> Result<Self> {
            let mut builder =
                Builder::new().ok_or_else(|| anyhow!("Failed to allocate LAME encoder"))?;
            builder
                .set_num_channels(1)
                .map_err(|e| anyhow!("Invalid LAME channel count: {:?}", e))?;
            builder
                .set_sample_rate(sample_rate)
                .map_err(|e| anyhow!("Invalid LAME sample rate {}: {:?}", sample_rate, e))?;
            builder
                .set_brate(bitrate(bitrate_kbps))
                .map_err(|e| anyhow!("Invalid LAME bitrate {}: {:?}", bitrate_kbps, e))?;
            builder
                .set_quality(quality_level(quality))
                .map_err(|e| anyhow!("Invalid LAME quality {}: {:?}", quality, e))?;
            let encoder = builder
                .build()
                .map_err(|e| anyhow!("Invalid LAME params: {:?}", e))?;

            log::info!(
                "LAME encoder ready: rate={}, bitrate={}kbps, quality={}",
                sample_rate,
                bitrate_kbps,
                quality
            );
            Ok(Self { encoder })
        }
    }

    impl SegmentEncoder for LameEncoder {
        fn encode(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<(), EncodeError> {
            // Writes into the reserved spare capacity only
            self.encoder
                .encode_to_vec(MonoPcm(pcm), out)
                .map(|_| ())
                .map_err(|e| EncodeError::Codec(format!("{:?}", e)))
        }

        fn extension(&self) -> &'static str {
            "mp3"
        }
    }

    fn bitrate(kbps: u32) -> Bitrate {
        match kbps {
            0..=8 => Bitrate::Kbps8,
            9..=16 => Bitrate::Kbps16,
            17..=24 => Bitrate::Kbps24,
            25..=32 => Bitrate::Kbps32,
            33..=40 => Bitrate::Kbps40,
            41..=48 => Bitrate::Kbps48,
            49..=64 => Bitrate::Kbps64,
            65..=80 => Bitrate::Kbps80,
            81..=96 => Bitrate::Kbps96,
            97..=112 => Bitrate::Kbps112,
            113..=128 => Bitrate::Kbps128,
            129..=160 => Bitrate::Kbps160,
            161..=192 => Bitrate::Kbps192,
            193..=224 => Bitrate::Kbps224,
            225..=256 => Bitrate::Kbps256,
            _ => Bitrate::Kbps320,
        }
    }

    fn quality_level(quality: u8) -> Quality {
        match quality {
            0 => Quality::Best,
            1 => Quality::SecondBest,
            2 => Quality::NearBest,
            3 => Quality::VeryNice,
            4 => Quality::Nice,
            5 => Quality::Good,
            6 => Quality::Decent,
            7 => Quality::Ok,
            8 => Quality::SecondWorst,
            _ => Quality::Worst,
        }
    }
}
