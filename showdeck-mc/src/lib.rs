//! # Showdeck Media Controller Library (showdeck-mc)
//!
//! Core playback engine for the dual-output presentation controller.
//!
//! **Purpose:** Own the media-decoding backend (real native library or the
//! built-in simulated decoder), expose a uniform transport surface, survive
//! backend crashes, and republish decoder notifications as a stable event
//! stream over HTTP/SSE.
//!
//! **Architecture:** One engine instance owns exactly one active decoder.
//! Backend faults are absorbed by replacing the decoder, never repairing it;
//! the simulated decoder is the guaranteed-available last resort.

pub mod api;
pub mod config;
pub mod decoder;
pub mod error;
pub mod playback;
pub mod playlist;

pub use error::{Error, Result};
pub use playback::engine::PlaybackEngine;
