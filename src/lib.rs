//! # Miqat Library
//!
//! Location-aware prayer schedule, countdown and Qibla bearing engine.
//!
//! The library is organized into several layers:
//!
//! - **Capabilities**: `geo` (coordinates, Qibla bearing, location providers),
//!   `heading` (compass normalization and permission handshake) and `schedule`
//!   (prayer-times client, de-duplicating fetcher, next-event resolution)
//! - **Engine**: `core` holds the state machine reducer and the live runtime
//!   that owns it
//! - **Configuration and state**: `config` for `miqat.toml`, `state` for
//!   persisted preferences
//! - **Presentation**: `display` and `args` back the terminal binary
//! - **Infrastructure**: logging, error taxonomy, clock abstraction

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod common;
pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod geo;
pub mod heading;
pub mod schedule;
pub mod state;
pub mod time_source;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use core::{Companion, CompanionHandle, EngineStatus, LiveSnapshot};
