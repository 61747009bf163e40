use crate::error::CaptureError;

/// A blocking source of signed 16-bit interleaved PCM.
pub trait CaptureSource {
    /// Fill `buf` completely, blocking until enough samples arrive.
    ///
    /// Anything short of a full buffer is an error; there is no partial
    /// segment.
    fn read(&mut self, buf: &mut [i16]) -> Result<(), CaptureError>;
}
