//! Session pipeline for frame-to-commentary processing.
//!
//! Batch sessions run every stage on the calling thread. Live sessions run a
//! single worker that owns all match state, feeding voice and sink stations
//! over crossbeam channels.

pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod sink;
pub mod station;
pub mod types;

pub use engine::CommentaryEngine;
pub use error::{ChannelReporter, ErrorRecord, ErrorReporter, LogReporter, StationError};
pub use orchestrator::{ControlMessage, Pipeline, PipelineConfig, PipelineHandle};
pub use sink::{
    CollectorSink, FanOutSink, JsonReportSink, PlaylistSink, ResultsSink, SinkStation,
    StdoutSink, TranscriptSink,
};
pub use station::{Station, StationRunner};
pub use types::{EventLogEntry, PipelineItem, SessionResults, SessionStatistics};
