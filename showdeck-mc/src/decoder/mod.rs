//! Decoder contract and the two implementations behind it
//!
//! The playback engine is polymorphic over exactly two decoder variants:
//! - [`RealDecoder`] drives the native decoding library resolved at runtime
//! - [`SimulatedDecoder`] is the self-contained fallback that never faults
//!
//! Both sit behind the [`ActiveDecoder`] tagged union so the contract is
//! enforced at compile time instead of via runtime capability checks. Every
//! operation either succeeds or returns an error; a decoder must never be
//! left in an unobservable state.

pub mod probe;
pub mod real;
pub mod simulated;

pub use probe::{probe, BackendAvailability};
pub use real::RealDecoder;
pub use simulated::SimulatedDecoder;

use crate::error::Result;
use tokio::sync::mpsc;

/// Asynchronous property notification from a decoder
///
/// Decoders push these at their own cadence through the channel handed to
/// them at construction. Only two properties are ever observed, so this is a
/// closed enum rather than an open named-property system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyChange {
    /// Playback position in seconds
    Position(f64),
    /// Media duration in seconds
    Duration(f64),
}

/// Channel on which decoders publish property notifications
pub type NotificationSender = mpsc::UnboundedSender<PropertyChange>;

/// The minimal capability set both decoder variants implement
pub trait Decoder {
    /// Start playback of a new media file, resetting position
    fn load(&mut self, path: &str) -> Result<()>;

    /// Set the paused flag
    fn set_paused(&mut self, paused: bool) -> Result<()>;

    /// Read the paused flag
    fn paused(&self) -> Result<bool>;

    /// Halt playback and reset position to zero
    fn stop(&mut self) -> Result<()>;

    /// Seek to an absolute position in seconds
    fn seek(&mut self, position: f64) -> Result<()>;

    /// Set the playback speed multiplier
    fn set_speed(&mut self, speed: f64) -> Result<()>;

    /// Set the volume on the 0-100 scale
    fn set_volume(&mut self, volume: f64) -> Result<()>;

    /// Attach to a platform window handle, or detach with None
    ///
    /// Backends that need a numeric "no window" sentinel translate None
    /// themselves; callers never see that mapping.
    fn set_output_target(&mut self, target: Option<i64>) -> Result<()>;

    /// Current playback position in seconds
    fn position(&self) -> Result<f64>;

    /// Media duration in seconds
    fn duration(&self) -> Result<f64>;
}

/// Exactly one of the two decoder variants, owned by the engine
///
/// Replaced wholesale on fault, never repaired: the real backend's fault
/// states are not guaranteed introspectable or resumable.
pub enum ActiveDecoder {
    Real(RealDecoder),
    Simulated(SimulatedDecoder),
}

impl ActiveDecoder {
    /// Whether this is the simulated fallback variant
    pub fn is_simulated(&self) -> bool {
        matches!(self, ActiveDecoder::Simulated(_))
    }

    /// Best-effort teardown of the underlying backend
    ///
    /// Called before the engine discards a faulted instance. Failures are
    /// reported so the recovery path can log them, but never block recovery.
    pub fn terminate(&mut self) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.terminate(),
            ActiveDecoder::Simulated(d) => {
                d.terminate();
                Ok(())
            }
        }
    }
}

impl Decoder for ActiveDecoder {
    fn load(&mut self, path: &str) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.load(path),
            ActiveDecoder::Simulated(d) => d.load(path),
        }
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.set_paused(paused),
            ActiveDecoder::Simulated(d) => d.set_paused(paused),
        }
    }

    fn paused(&self) -> Result<bool> {
        match self {
            ActiveDecoder::Real(d) => d.paused(),
            ActiveDecoder::Simulated(d) => d.paused(),
        }
    }

    fn stop(&mut self) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.stop(),
            ActiveDecoder::Simulated(d) => d.stop(),
        }
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.seek(position),
            ActiveDecoder::Simulated(d) => d.seek(position),
        }
    }

    fn set_speed(&mut self, speed: f64) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.set_speed(speed),
            ActiveDecoder::Simulated(d) => d.set_speed(speed),
        }
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.set_volume(volume),
            ActiveDecoder::Simulated(d) => d.set_volume(volume),
        }
    }

    fn set_output_target(&mut self, target: Option<i64>) -> Result<()> {
        match self {
            ActiveDecoder::Real(d) => d.set_output_target(target),
            ActiveDecoder::Simulated(d) => d.set_output_target(target),
        }
    }

    fn position(&self) -> Result<f64> {
        match self {
            ActiveDecoder::Real(d) => d.position(),
            ActiveDecoder::Simulated(d) => d.position(),
        }
    }

    fn duration(&self) -> Result<f64> {
        match self {
            ActiveDecoder::Real(d) => d.duration(),
            ActiveDecoder::Simulated(d) => d.duration(),
        }
    }
}
