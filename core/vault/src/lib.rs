//! Vault layer for HexCore.
//!
//! This module provides:
//! - The vault manager, moving files into and out of the encrypted store
//! - Settings with JSON persistence and environment overrides
//! - The PIN gate guarding every vault operation
//! - A background task runner with an ordered event channel
//!
//! # Architecture
//! The vault layer sits between a front end and the encryption engine. It
//! never touches key material beyond the password it passes through.

pub mod config;
pub mod gate;
pub mod manager;
pub mod operations;
pub mod task;

pub use config::VaultSettings;
pub use gate::{AccessGate, Credential};
pub use manager::{BatchProgress, BatchStats, StoreStatus, VaultManager, VerifyEntry, VerifyReport};
pub use operations::VaultOperations;
pub use task::{spawn_task, TaskEvent, TaskHandle, TaskReporter};
