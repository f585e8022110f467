//! Video frames and the sources that produce them.

pub mod source;

pub use source::{
    CaptureSource, FrameSource, MockFrameSource, RecordedSource, SyntheticSource,
};

/// One sampled frame of gameplay video.
///
/// `data` is the encoded image as delivered by the source; the pipeline never
/// decodes it, only perception backends look inside.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Ordinal of the sample within the session: 0, 1, 2, ... whatever the
    /// source's own frame rate.
    pub index: u64,
    /// Seconds since the start of the session.
    pub timestamp: f64,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, data: Vec<u8>) -> Self {
        Self {
            index,
            timestamp,
            data,
        }
    }

    /// Frame with no payload, for sources and tests that only need timing.
    pub fn empty(index: u64, timestamp: f64) -> Self {
        Self::new(index, timestamp, Vec::new())
    }
}
