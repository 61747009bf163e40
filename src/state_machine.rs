/// Where the segment pipeline is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Capturing,
    Encoding,
    Persisting,
    Published,
    Failed,
}
