//! Authoritative 1v1 real-time-strategy match server.
//!
//! The server is the only simulator: clients send intents, the per-room
//! session validates them and advances the engine at a fixed 60 Hz, and
//! fog-filtered snapshots go back out at 10 Hz.

pub mod config;
pub mod game;
pub mod http;
pub mod metrics;
pub mod protocol;
pub mod rooms;
pub mod ws;
