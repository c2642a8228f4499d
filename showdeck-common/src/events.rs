//! Event types for the showdeck event system
//!
//! Provides the shared event definitions and the EventBus used to fan playback
//! events out to every listener (SSE clients, loggers, tests).
//!
//! The media controller republishes decoder property notifications through
//! this bus; listeners subscribe without the engine knowing who they are.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::playlist::PlaylistItem;

/// Showdeck event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events carry a UTC timestamp so clients can reorder or
/// age-out stale updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShowdeckEvent {
    /// Playback position update from the active decoder
    ///
    /// Emitted at the decoder's own cadence (the simulated decoder ticks every
    /// 100ms). No ordering guarantee relative to DurationChanged after a load.
    PositionChanged {
        /// Current position in seconds
        seconds: f64,
        /// When the notification was republished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Media duration became known (or changed)
    ///
    /// Arrives asynchronously after a load; callers must tolerate a transient
    /// default duration until this fires.
    DurationChanged {
        /// Total duration in seconds
        seconds: f64,
        /// When the notification was republished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback started or paused
    PlaybackStatusChanged {
        /// true when playing, false when paused/stopped
        playing: bool,
        /// When the status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Master volume changed
    VolumeChanged {
        /// Volume on the user-facing 0-100 scale
        volume: f64,
        /// When the volume changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playlist cursor moved
    ///
    /// Carries the newly selected item, or None when the list became empty.
    CurrentItemChanged {
        /// The item now under the cursor
        item: Option<PlaylistItem>,
        /// When the cursor moved
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The engine replaced a faulted decoder instance
    ///
    /// The engine absorbs every backend fault; this event is the only signal
    /// that a silent swap happened. `degraded` is true when the replacement is
    /// the simulated decoder.
    DecoderRecovered {
        /// Whether the engine is now running on the simulated decoder
        degraded: bool,
        /// Total number of recoveries since startup
        recoveries: u64,
        /// When the recovery completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ShowdeckEvent {
    /// Event type string for SSE `event:` fields
    pub fn type_str(&self) -> &'static str {
        match self {
            ShowdeckEvent::PositionChanged { .. } => "PositionChanged",
            ShowdeckEvent::DurationChanged { .. } => "DurationChanged",
            ShowdeckEvent::PlaybackStatusChanged { .. } => "PlaybackStatusChanged",
            ShowdeckEvent::VolumeChanged { .. } => "VolumeChanged",
            ShowdeckEvent::CurrentItemChanged { .. } => "CurrentItemChanged",
            ShowdeckEvent::DecoderRecovered { .. } => "DecoderRecovered",
        }
    }
}

/// One-to-many event broadcaster backed by `tokio::sync::broadcast`
///
/// ```
/// use showdeck_common::events::{EventBus, ShowdeckEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit(ShowdeckEvent::PlaybackStatusChanged {
///     playing: true,
///     timestamp: chrono::Utc::now(),
/// }).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ShowdeckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// `capacity` is the number of events buffered before slow subscribers
    /// start lagging and dropping old events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ShowdeckEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ShowdeckEvent,
    ) -> Result<usize, broadcast::error::SendError<ShowdeckEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// Used for high-frequency notifications (position ticks) where an empty
    /// listener set is routine, not an error.
    pub fn emit_lossy(&self, event: ShowdeckEvent) {
        let _ = self.tx.send(event);
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
