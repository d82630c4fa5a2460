//! Common utilities and types shared across HexCore modules.
//!
//! This module provides the error taxonomy every public operation reports
//! through, plus the small value types that cross crate boundaries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Algorithm, IntegrityStatus, SensitiveBytes};
