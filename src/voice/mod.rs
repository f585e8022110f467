//! Optional audio rendering of commentary.

pub mod station;
pub mod synthesizer;

pub use station::{VoiceRenderer, VoiceStation};
pub use synthesizer::{
    ApiKey, AudioStore, CommandSynthesizer, MockSynthesizer, RateLimiter, VoiceProfile,
    VoiceSynthesizer,
};
