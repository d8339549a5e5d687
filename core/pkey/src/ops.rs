//! Asymmetric encrypt/decrypt contexts.

use tracing::{debug, warn};

use crate::key::{AsymmetricKey, RsaPadding};
use cryptoshim_common::{Error, Result};

/// Operation a context has been initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationKind {
    #[default]
    None,
    Encrypt,
    Decrypt,
}

/// One asymmetric encrypt or decrypt operation against a borrowed key.
///
/// The context must be initialized for the direction it is used in. Calling
/// the other direction fails without touching the context.
#[derive(Debug, Clone)]
pub struct KeyOperationContext<'a> {
    key: &'a AsymmetricKey,
    padding: RsaPadding,
    operation: OperationKind,
}

impl<'a> KeyOperationContext<'a> {
    pub fn new(key: &'a AsymmetricKey) -> Self {
        Self {
            key,
            padding: RsaPadding::default(),
            operation: OperationKind::None,
        }
    }

    pub fn key(&self) -> &'a AsymmetricKey {
        self.key
    }

    pub fn padding(&self) -> RsaPadding {
        self.padding
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn set_padding(&mut self, padding: RsaPadding) {
        self.padding = padding;
    }

    pub fn init_encrypt(&mut self) {
        debug!(key_type = %self.key.key_type(), "init asymmetric encrypt");
        self.operation = OperationKind::Encrypt;
    }

    pub fn init_decrypt(&mut self) {
        debug!(key_type = %self.key.key_type(), "init asymmetric decrypt");
        self.operation = OperationKind::Decrypt;
    }

    /// Output buffer size a caller must provide: the key's modulus size.
    pub fn output_len(&self) -> usize {
        self.key.size()
    }

    /// Largest plaintext accepted under the current padding.
    pub fn max_payload_len(&self) -> usize {
        self.padding.max_payload_len(self.key.size())
    }

    /// Encrypt `plaintext` with the public key.
    ///
    /// # Preconditions
    /// - The context was initialized with [`init_encrypt`](Self::init_encrypt)
    ///
    /// # Errors
    /// - `OperationStateMismatch` if initialized for another operation
    /// - `NotImplemented` for EC keys
    /// - `InvalidArgument` if `plaintext` exceeds the padding limit
    /// - `Crypto` if the backend fails
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.require(OperationKind::Encrypt)?;
        let rsa = match self.key {
            AsymmetricKey::Rsa(rsa) => rsa,
            AsymmetricKey::Ec(_) => {
                return Err(Error::NotImplemented("EC encryption".to_string()))
            }
        };

        let ciphertext = rsa.public_encrypt(self.padding, plaintext)?;
        debug!(
            padding = ?self.padding,
            len = ciphertext.len(),
            "asymmetric encrypt complete"
        );
        Ok(ciphertext)
    }

    /// Decrypt `ciphertext` with the private key.
    ///
    /// # Preconditions
    /// - The context was initialized with [`init_decrypt`](Self::init_decrypt)
    /// - The key holds its private part
    ///
    /// # Errors
    /// - `OperationStateMismatch` if initialized for another operation
    /// - `NotImplemented` for EC keys
    /// - `InvalidArgument` for a public-only key
    /// - `Crypto` if the ciphertext is rejected or decrypts to nothing
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.require(OperationKind::Decrypt)?;
        let rsa = match self.key {
            AsymmetricKey::Rsa(rsa) => rsa,
            AsymmetricKey::Ec(_) => {
                return Err(Error::NotImplemented("EC decryption".to_string()))
            }
        };

        let plaintext = rsa.private_decrypt(self.padding, ciphertext)?;
        if plaintext.is_empty() {
            warn!(padding = ?self.padding, "asymmetric decrypt produced no output");
            return Err(Error::Crypto("Decryption produced no output".to_string()));
        }
        debug!(
            padding = ?self.padding,
            len = plaintext.len(),
            "asymmetric decrypt complete"
        );
        Ok(plaintext)
    }

    fn require(&self, wanted: OperationKind) -> Result<()> {
        if self.operation != wanted {
            warn!(
                initialized = ?self.operation,
                requested = ?wanted,
                "asymmetric operation mismatch"
            );
            return Err(Error::OperationStateMismatch(format!(
                "Context initialized for {:?}, called for {:?}",
                self.operation, wanted
            )));
        }
        Ok(())
    }
}
