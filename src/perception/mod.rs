//! Frame perception: object detection, OCR and confidence filtering.

pub mod adapter;
pub mod backend;
pub mod mock;
pub mod replay;
pub mod types;

pub use adapter::{PerceptionAdapter, PerceptionStats};
pub use backend::{BackendKind, FallbackPolicy, PerceptionBackend};
pub use mock::MockPerceptionBackend;
pub use replay::ReplayPerceptionBackend;
pub use types::{BoundingBox, DetectionRecord, Region, TextDetection};
