//! # Showdeck Common Library
//!
//! Shared code for the showdeck presentation controller:
//! - Event types (ShowdeckEvent enum) and the EventBus broadcaster
//! - Playlist item types exchanged between the media controller and its clients

pub mod events;
pub mod playlist;

pub use events::{EventBus, ShowdeckEvent};
pub use playlist::PlaylistItem;
