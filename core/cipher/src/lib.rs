//! Streaming symmetric ciphers for cryptoshim.
//!
//! This module provides:
//! - A capability-driven registry of block and stream ciphers
//! - PKCS-style padding with constant-structure validation
//! - An init/update/final transform that is insensitive to input chunking
//!
//! # Security Guarantees
//! - Buffered plaintext and ciphertext are zeroized when released
//! - No plaintext, ciphertext or key material is ever logged
//! - Padding validation does not branch on the mismatch position

pub mod block;
pub mod capabilities;
pub mod padding;
mod primitive;
pub mod registry;
pub mod transform;

pub use block::{BlockBuffer, MAX_BLOCK_SIZE};
pub use capabilities::Capabilities;
pub use padding::PaddingCodec;
pub use registry::{CipherDescriptor, CipherFamily, CipherId, CipherRegistry, ModeClass};
pub use transform::{decrypt_bytes, encrypt_bytes, CipherTransform, TransformState};
