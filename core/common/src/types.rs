//! Common types used throughout cryptoshim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a symmetric transform, fixed when the transform is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Check if this is the encrypting direction.
    pub fn is_encrypt(self) -> bool {
        self == Self::Encrypt
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => write!(f, "encrypt"),
            Self::Decrypt => write!(f, "decrypt"),
        }
    }
}
