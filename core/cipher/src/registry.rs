//! Cipher identifiers and the registry that resolves them.
//!
//! Every supported (algorithm, mode, key size) triple is a variant of
//! [`CipherId`] with a fixed [`CipherDescriptor`]. A [`CipherRegistry`]
//! exposes the subset enabled by its [`Capabilities`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::Capabilities;
use cryptoshim_common::{Error, Result};

/// Underlying block or stream primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CipherFamily {
    Aes,
    Des,
    TripleDes,
    Rc4,
}

/// How the primitive is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModeClass {
    /// Block cipher, cipher block chaining.
    Cbc,
    /// Block cipher, electronic codebook.
    Ecb,
    /// Block cipher turned into a keystream by a big-endian counter.
    Ctr,
    /// Native byte-stream cipher.
    Stream,
}

/// Cipher identifier.
///
/// Serializes as the canonical name, e.g. `"AES-128-CBC"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CipherId {
    #[serde(rename = "AES-128-CBC")]
    Aes128Cbc,
    #[serde(rename = "AES-192-CBC")]
    Aes192Cbc,
    #[serde(rename = "AES-256-CBC")]
    Aes256Cbc,
    #[serde(rename = "AES-128-ECB")]
    Aes128Ecb,
    #[serde(rename = "AES-192-ECB")]
    Aes192Ecb,
    #[serde(rename = "AES-256-ECB")]
    Aes256Ecb,
    #[serde(rename = "AES-128-CTR")]
    Aes128Ctr,
    #[serde(rename = "AES-192-CTR")]
    Aes192Ctr,
    #[serde(rename = "AES-256-CTR")]
    Aes256Ctr,
    #[serde(rename = "DES-CBC")]
    DesCbc,
    #[serde(rename = "DES-ECB")]
    DesEcb,
    #[serde(rename = "DES-EDE3-CBC")]
    DesEde3Cbc,
    #[serde(rename = "DES-EDE3-ECB")]
    DesEde3Ecb,
    #[serde(rename = "RC4")]
    Rc4,
}

impl CipherId {
    /// Every identifier, in table order.
    pub const ALL: [CipherId; 14] = [
        Self::Aes128Cbc,
        Self::Aes192Cbc,
        Self::Aes256Cbc,
        Self::Aes128Ecb,
        Self::Aes192Ecb,
        Self::Aes256Ecb,
        Self::Aes128Ctr,
        Self::Aes192Ctr,
        Self::Aes256Ctr,
        Self::DesCbc,
        Self::DesEcb,
        Self::DesEde3Cbc,
        Self::DesEde3Ecb,
        Self::Rc4,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "AES-128-CBC",
            Self::Aes192Cbc => "AES-192-CBC",
            Self::Aes256Cbc => "AES-256-CBC",
            Self::Aes128Ecb => "AES-128-ECB",
            Self::Aes192Ecb => "AES-192-ECB",
            Self::Aes256Ecb => "AES-256-ECB",
            Self::Aes128Ctr => "AES-128-CTR",
            Self::Aes192Ctr => "AES-192-CTR",
            Self::Aes256Ctr => "AES-256-CTR",
            Self::DesCbc => "DES-CBC",
            Self::DesEcb => "DES-ECB",
            Self::DesEde3Cbc => "DES-EDE3-CBC",
            Self::DesEde3Ecb => "DES-EDE3-ECB",
            Self::Rc4 => "RC4",
        }
    }

    /// Fixed descriptor for this identifier.
    pub fn descriptor(self) -> CipherDescriptor {
        use CipherFamily::*;
        use ModeClass::*;

        let (family, mode, block_size, key_len, iv_len) = match self {
            Self::Aes128Cbc => (Aes, Cbc, 16, 16, 16),
            Self::Aes192Cbc => (Aes, Cbc, 16, 24, 16),
            Self::Aes256Cbc => (Aes, Cbc, 16, 32, 16),
            Self::Aes128Ecb => (Aes, Ecb, 16, 16, 0),
            Self::Aes192Ecb => (Aes, Ecb, 16, 24, 0),
            Self::Aes256Ecb => (Aes, Ecb, 16, 32, 0),
            Self::Aes128Ctr => (Aes, Ctr, 1, 16, 16),
            Self::Aes192Ctr => (Aes, Ctr, 1, 24, 16),
            Self::Aes256Ctr => (Aes, Ctr, 1, 32, 16),
            Self::DesCbc => (Des, Cbc, 8, 8, 8),
            Self::DesEcb => (Des, Ecb, 8, 8, 0),
            Self::DesEde3Cbc => (TripleDes, Cbc, 8, 24, 8),
            Self::DesEde3Ecb => (TripleDes, Ecb, 8, 24, 0),
            Self::Rc4 => (CipherFamily::Rc4, Stream, 1, 16, 0),
        };

        CipherDescriptor {
            id: self,
            family,
            mode,
            block_size,
            key_len,
            iv_len,
        }
    }
}

impl fmt::Display for CipherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherId {
    type Err = Error;

    /// Parse a canonical name, ignoring ASCII case.
    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("Unknown cipher '{}'", name)))
    }
}

/// Immutable description of a cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherDescriptor {
    id: CipherId,
    family: CipherFamily,
    mode: ModeClass,
    block_size: usize,
    key_len: usize,
    iv_len: usize,
}

impl CipherDescriptor {
    pub fn id(&self) -> CipherId {
        self.id
    }

    pub fn family(&self) -> CipherFamily {
        self.family
    }

    pub fn mode(&self) -> ModeClass {
        self.mode
    }

    /// Block size in bytes. 1 means the cipher never pads.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// IV length in bytes, 0 when the mode takes none.
    pub fn iv_len(&self) -> usize {
        self.iv_len
    }

    /// Check if this is a byte-stream cipher.
    pub fn is_stream(&self) -> bool {
        self.block_size == 1
    }
}

/// Registry of enabled cipher descriptors.
///
/// Resolution is a pure lookup: unknown or disabled identifiers yield
/// `UnsupportedAlgorithm`, never a substitute cipher.
#[derive(Debug, Clone)]
pub struct CipherRegistry {
    descriptors: HashMap<CipherId, CipherDescriptor>,
}

impl CipherRegistry {
    /// Create a registry exposing exactly the ciphers in `capabilities`.
    pub fn new(capabilities: &Capabilities) -> Self {
        let descriptors: HashMap<_, _> = capabilities
            .ciphers
            .iter()
            .map(|id| (*id, id.descriptor()))
            .collect();
        debug!(ciphers = descriptors.len(), "cipher registry created");
        Self { descriptors }
    }

    /// Resolve an identifier to its descriptor.
    ///
    /// # Errors
    /// - `UnsupportedAlgorithm` if the cipher is not enabled
    pub fn resolve(&self, id: CipherId) -> Result<CipherDescriptor> {
        self.descriptors.get(&id).copied().ok_or_else(|| {
            debug!(cipher = %id, "cipher not enabled");
            Error::UnsupportedAlgorithm(format!("Cipher '{}' is not enabled", id))
        })
    }

    /// Resolve a cipher by name.
    ///
    /// # Errors
    /// - `UnsupportedAlgorithm` if the name is unknown or the cipher is not enabled
    pub fn resolve_name(&self, name: &str) -> Result<CipherDescriptor> {
        self.resolve(name.parse()?)
    }

    /// Get the enabled identifiers, in table order.
    pub fn ciphers(&self) -> Vec<CipherId> {
        let mut ids: Vec<_> = self.descriptors.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Check if a cipher is enabled.
    pub fn supports(&self, id: CipherId) -> bool {
        self.descriptors.contains_key(&id)
    }
}

impl Default for CipherRegistry {
    fn default() -> Self {
        Self::new(&Capabilities::default())
    }
}
