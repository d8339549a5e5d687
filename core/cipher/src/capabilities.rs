//! Capability set controlling which ciphers a registry exposes.
//!
//! The set is assembled once (from a preset, a builder chain or a JSON
//! document) and handed to [`CipherRegistry::new`](crate::CipherRegistry::new).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::registry::{CipherFamily, CipherId};
use cryptoshim_common::{Error, Result};

/// Enabled cipher identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Ciphers the registry will resolve. Anything absent is unsupported.
    pub ciphers: BTreeSet<CipherId>,
}

impl Capabilities {
    /// Every cipher this crate implements.
    pub fn all() -> Self {
        Self {
            ciphers: CipherId::ALL.iter().copied().collect(),
        }
    }

    /// AES in every mode; DES, Triple-DES and RC4 are left out.
    pub fn modern() -> Self {
        Self {
            ciphers: CipherId::ALL
                .iter()
                .copied()
                .filter(|id| id.descriptor().family() == CipherFamily::Aes)
                .collect(),
        }
    }

    /// Nothing enabled.
    pub fn none() -> Self {
        Self {
            ciphers: BTreeSet::new(),
        }
    }

    /// Enable a cipher.
    pub fn with(mut self, id: CipherId) -> Self {
        self.ciphers.insert(id);
        self
    }

    /// Disable a cipher.
    pub fn without(mut self, id: CipherId) -> Self {
        self.ciphers.remove(&id);
        self
    }

    /// Check if a cipher is enabled.
    pub fn is_enabled(&self, id: CipherId) -> bool {
        self.ciphers.contains(&id)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// Unknown cipher names are rejected rather than skipped.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_contains_every_cipher() {
        let caps = Capabilities::all();
        for id in CipherId::ALL {
            assert!(caps.is_enabled(id), "{id} missing");
        }
    }

    #[test]
    fn test_modern_excludes_legacy() {
        let caps = Capabilities::modern();
        assert!(caps.is_enabled(CipherId::Aes256Cbc));
        assert!(caps.is_enabled(CipherId::Aes128Ctr));
        assert!(!caps.is_enabled(CipherId::DesCbc));
        assert!(!caps.is_enabled(CipherId::DesEde3Ecb));
        assert!(!caps.is_enabled(CipherId::Rc4));
    }

    #[test]
    fn test_builder() {
        let caps = Capabilities::none()
            .with(CipherId::Aes128Cbc)
            .with(CipherId::Rc4)
            .without(CipherId::Rc4);
        assert!(caps.is_enabled(CipherId::Aes128Cbc));
        assert!(!caps.is_enabled(CipherId::Rc4));
        assert_eq!(caps.ciphers.len(), 1);
    }

    #[test]
    fn test_json_uses_cipher_names() {
        let caps = Capabilities::none().with(CipherId::DesEde3Cbc);
        let json = caps.to_json().unwrap();
        assert!(json.contains("\"DES-EDE3-CBC\""));

        let restored = Capabilities::from_json(&json).unwrap();
        assert_eq!(restored, caps);
    }

    #[test]
    fn test_json_unknown_cipher_fails() {
        let result = Capabilities::from_json(r#"{"ciphers": ["AES-128-XTS"]}"#);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
