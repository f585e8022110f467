//! Deciding when to speak and what to say.

pub mod generator;
pub mod scheduler;
pub mod templates;
pub mod types;

pub use generator::CommentaryGenerator;
pub use scheduler::{CommentaryScheduler, Decision, SchedulerConfig, SuppressReason};
pub use templates::TemplateBank;
pub use types::{CommentaryRequest, CommentarySegment, CommentaryStyle, sort_segments};
