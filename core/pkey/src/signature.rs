//! Digest-then-sign contexts.
//!
//! A [`SignatureContext`] accumulates message data into a digest and, at
//! finalization, signs or verifies that digest with an RSA key using
//! PKCS#1 v1.5. Sign and verify paths are separate; using the wrong one is
//! an [`Error::OperationStateMismatch`].

use md5::Md5;
use rsa::Pkcs1v15Sign;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use tracing::{debug, warn};

use crate::digest::{DigestAlgorithm, DigestContext};
use crate::key::{AsymmetricKey, RsaKey};
use cryptoshim_common::{Error, Result};

/// Lifecycle of a signature context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureState {
    #[default]
    Idle,
    Signing,
    Verifying,
    Finalized,
}

/// Map a digest onto its PKCS#1 v1.5 signature scheme.
fn signature_scheme(algorithm: DigestAlgorithm) -> Result<Pkcs1v15Sign> {
    match algorithm {
        DigestAlgorithm::Md5 => Ok(Pkcs1v15Sign::new::<Md5>()),
        DigestAlgorithm::Sha1 => Ok(Pkcs1v15Sign::new::<Sha1>()),
        DigestAlgorithm::Sha224 => Ok(Pkcs1v15Sign::new::<Sha224>()),
        DigestAlgorithm::Sha256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
        DigestAlgorithm::Sha384 => Ok(Pkcs1v15Sign::new::<Sha384>()),
        DigestAlgorithm::Sha512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        DigestAlgorithm::Blake2b512 => Err(Error::UnsupportedAlgorithm(format!(
            "{} has no RSA signature mapping",
            algorithm
        ))),
    }
}

/// Streaming sign/verify context.
#[derive(Debug, Clone, Default)]
pub struct SignatureContext {
    state: SignatureState,
    digest: Option<DigestContext>,
}

impl SignatureContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SignatureState {
        self.state
    }

    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        self.digest.as_ref().map(DigestContext::algorithm)
    }

    /// Largest signature `key` can produce.
    pub fn signature_len(key: &AsymmetricKey) -> usize {
        key.size()
    }

    /// Start a signing session, discarding any previous one.
    pub fn sign_init(&mut self, algorithm: DigestAlgorithm) {
        self.start(SignatureState::Signing, algorithm);
    }

    pub fn sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.absorb(SignatureState::Signing, data)
    }

    /// Sign the accumulated digest.
    ///
    /// Key and scheme checks run before the digest is consumed, so a
    /// rejected call can be retried with another key.
    ///
    /// # Errors
    /// - `OperationStateMismatch` unless a signing session is active
    /// - `NotImplemented` for EC keys
    /// - `InvalidArgument` for a public-only key
    /// - `UnsupportedAlgorithm` if the digest has no signature mapping
    /// - `Crypto` if the backend fails
    pub fn sign_final(&mut self, key: &AsymmetricKey) -> Result<Vec<u8>> {
        self.require(SignatureState::Signing)?;
        let rsa = rsa_key(key, "signing")?;
        if !rsa.has_private() {
            return Err(Error::InvalidArgument(
                "Signing requires a private key".to_string(),
            ));
        }
        let (algorithm, hashed) = self.finish()?;
        let signature = rsa.sign(signature_scheme(algorithm)?, &hashed)?;
        debug!(digest = %algorithm, len = signature.len(), "signature created");
        Ok(signature)
    }

    /// Start a verification session, discarding any previous one.
    pub fn verify_init(&mut self, algorithm: DigestAlgorithm) {
        self.start(SignatureState::Verifying, algorithm);
    }

    pub fn verify_update(&mut self, data: &[u8]) -> Result<()> {
        self.absorb(SignatureState::Verifying, data)
    }

    /// Check `signature` against the accumulated digest.
    ///
    /// A malformed or non-matching signature yields `Ok(false)`.
    ///
    /// # Errors
    /// - `OperationStateMismatch` unless a verification session is active
    /// - `NotImplemented` for EC keys
    /// - `UnsupportedAlgorithm` if the digest has no signature mapping
    pub fn verify_final(&mut self, key: &AsymmetricKey, signature: &[u8]) -> Result<bool> {
        self.require(SignatureState::Verifying)?;
        let rsa = rsa_key(key, "verification")?;
        let (algorithm, hashed) = self.finish()?;
        let valid = rsa.verify(signature_scheme(algorithm)?, &hashed, signature);
        debug!(digest = %algorithm, valid, "signature checked");
        Ok(valid)
    }

    fn start(&mut self, state: SignatureState, algorithm: DigestAlgorithm) {
        debug!(?state, digest = %algorithm, "signature session started");
        self.state = state;
        self.digest = Some(DigestContext::new(algorithm));
    }

    fn absorb(&mut self, wanted: SignatureState, data: &[u8]) -> Result<()> {
        self.require(wanted)?;
        if let Some(digest) = self.digest.as_mut() {
            digest.update(data);
        }
        Ok(())
    }

    /// Consume the digest once every pre-check passed.
    fn finish(&mut self) -> Result<(DigestAlgorithm, Vec<u8>)> {
        let algorithm = self
            .digest_algorithm()
            .ok_or_else(|| Error::OperationStateMismatch("No digest in progress".to_string()))?;
        // The scheme lookup must fail before the digest is gone.
        signature_scheme(algorithm)?;
        let digest = self
            .digest
            .take()
            .ok_or_else(|| Error::OperationStateMismatch("No digest in progress".to_string()))?;
        self.state = SignatureState::Finalized;
        Ok((algorithm, digest.finalize()))
    }

    fn require(&self, wanted: SignatureState) -> Result<()> {
        if self.state != wanted {
            warn!(current = ?self.state, requested = ?wanted, "signature state mismatch");
            return Err(Error::OperationStateMismatch(format!(
                "Signature context is {:?}, expected {:?}",
                self.state, wanted
            )));
        }
        Ok(())
    }
}

fn rsa_key<'k>(key: &'k AsymmetricKey, operation: &str) -> Result<&'k RsaKey> {
    match key {
        AsymmetricKey::Rsa(rsa) => Ok(rsa),
        AsymmetricKey::Ec(_) => Err(Error::NotImplemented(format!("EC {}", operation))),
    }
}
