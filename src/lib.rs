//! # Landau - vehicle companion command and charging engine
//!
//! Backend for a vehicle companion app: remote commands (lock, climate,
//! trunk, ...) are validated against the current vehicle state, queued and
//! executed one at a time with simulated latency, while a charging simulator
//! advances the shared battery state along a tapering curve.
//!
//! ## Features
//!
//! - **Command dispatch**: FIFO queue, single worker, terminal statuses that never change
//! - **Safety gating**: battery, motion and temperature checks before and at execution
//! - **Charging simulation**: per-session background task with bounded stop
//! - **Schedules**: weekly start or ready-by charging schedules
//! - **Persistence**: atomic JSON files, in-memory store for tests
//! - **Web Interface**: REST API over axum
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `error`: Error types
//! - `vehicle`: Vehicle state model and the shared handle
//! - `command`: Remote command model and lifecycle
//! - `queue`: FIFO command queue
//! - `safety`: Command preconditions
//! - `dispatcher`: Command execution worker
//! - `session`: Charging session tracking
//! - `charging`: Charging curve, simulator loop and stations
//! - `schedule`: Charging schedules
//! - `persistence`: Command, charging and vehicle stores
//! - `engine`: Facade tying the components together
//! - `web`: HTTP server and REST API

pub mod charging;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod queue;
pub mod safety;
pub mod schedule;
pub mod session;
pub mod vehicle;
pub mod web;

#[cfg(test)]
mod web_tests;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CompanionEngine, EngineStores};
pub use error::{LandauError, Result};
