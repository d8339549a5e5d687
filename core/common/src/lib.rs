//! Common utilities and types shared across cryptoshim modules.
//!
//! This module provides the error taxonomy every transform reports through,
//! plus the small value types shared by the symmetric and asymmetric halves.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::Direction;
