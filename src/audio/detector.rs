//! Loudness threshold detector.
//!
//! Scans a captured segment with a fixed stride and counts samples whose
//! amplitude exceeds the level threshold. A segment is loud when the count
//! exceeds the intensity threshold. Each segment is judged on its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventVerdict {
    pub is_loud: bool,
    pub exceed_count: u32,
}

/// A loud segment, handed to a [`LoudnessSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoudEvent {
    pub sequence_number: u64,
    pub verdict: EventVerdict,
}

/// Receives loud-segment notifications. Implementations must not block.
pub trait LoudnessSink {
    fn notify(&mut self, event: LoudEvent);
}

impl LoudnessSink for tokio::sync::mpsc::Sender<LoudEvent> {
    fn notify(&mut self, event: LoudEvent) {
        if let Err(e) = self.try_send(event) {
            log::warn!(
                "Dropping loud event for segment {}: {}",
                event.sequence_number,
                e
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    level_threshold: i32,
    intensity_threshold: u32,
    stride: usize,
    /// Only count positive excursions.
    positive_only: bool,
}

impl ThresholdDetector {
    /// `stride` of 0 is treated as 1.
    pub fn new(level_threshold: i32, intensity_threshold: u32, stride: usize) -> Self {
        Self {
            level_threshold,
            intensity_threshold,
            stride: stride.max(1),
            positive_only: false,
        }
    }

    pub fn positive_only(mut self, positive_only: bool) -> Self {
        self.positive_only = positive_only;
        self
    }

    pub fn scan(&self, pcm: &[i16]) -> EventVerdict {
        let level = self.level_threshold;
        let exceed_count = pcm
            .iter()
            .step_by(self.stride)
            .filter(|&&s| {
                let amplitude = if self.positive_only {
                    i32::from(s)
                } else {
                    i32::from(s).abs()
                };
                amplitude > level
            })
            .count() as u32;

        EventVerdict {
            is_loud: exceed_count > self.intensity_threshold,
            exceed_count,
        }
    }
}
