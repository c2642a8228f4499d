//! Playback engine - transport control, fault recovery, event republishing

pub mod engine;

pub use engine::{EngineConfig, PlaybackEngine};
