//! Asymmetric key objects.
//!
//! An [`AsymmetricKey`] is the long-lived object that key-operation and
//! signature contexts borrow. It is immutable after construction, so any
//! number of contexts may share it across threads.

use std::fmt;

use rand::rngs::OsRng;
use rsa::hazmat::{rsa_decrypt_and_check, rsa_encrypt};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use cryptoshim_common::{Error, Result};

/// Smallest RSA modulus accepted for generation.
pub const MIN_RSA_BITS: usize = 1024;

/// PKCS#1 v1.5 encryption overhead in bytes.
const PKCS1_OVERHEAD: usize = 11;

/// SHA-1 output length, which fixes the OAEP overhead.
const OAEP_SHA1_LEN: usize = 20;

/// Type tag of an asymmetric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ec,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::Ec => write!(f, "EC"),
        }
    }
}

/// RSA encryption padding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RsaPadding {
    /// RSAES-PKCS1-v1_5.
    #[default]
    Pkcs1,
    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1.
    Oaep,
    /// Raw RSA; input must be exactly the modulus size.
    None,
}

impl RsaPadding {
    /// Largest plaintext this scheme accepts for a `key_size`-byte modulus.
    pub fn max_payload_len(self, key_size: usize) -> usize {
        match self {
            Self::Pkcs1 => key_size.saturating_sub(PKCS1_OVERHEAD),
            Self::Oaep => key_size.saturating_sub(2 * OAEP_SHA1_LEN + 2),
            Self::None => key_size,
        }
    }
}

/// RSA key: always a public part, optionally the private part.
#[derive(Clone)]
pub struct RsaKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
}

impl RsaKey {
    /// Generate a key pair with a `bits`-bit modulus.
    ///
    /// # Errors
    /// - `InvalidArgument` if `bits` is below [`MIN_RSA_BITS`]
    /// - `Crypto` if generation fails
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_RSA_BITS {
            return Err(Error::InvalidArgument(format!(
                "RSA keys need at least {} bits, got {}",
                MIN_RSA_BITS, bits
            )));
        }
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::Crypto(format!("RSA key generation failed: {}", e)))?;
        Ok(Self::from_private(private))
    }

    pub fn from_private(private: RsaPrivateKey) -> Self {
        Self {
            public: RsaPublicKey::from(&private),
            private: Some(private),
        }
    }

    pub fn from_public(public: RsaPublicKey) -> Self {
        Self {
            public,
            private: None,
        }
    }

    /// Load a PKCS#1 DER `RSAPrivateKey`.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| Error::InvalidArgument(format!("Invalid RSA private key: {}", e)))?;
        Ok(Self::from_private(private))
    }

    /// Load a PKCS#1 DER `RSAPublicKey`.
    pub fn public_from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let public = RsaPublicKey::from_pkcs1_der(der)
            .map_err(|e| Error::InvalidArgument(format!("Invalid RSA public key: {}", e)))?;
        Ok(Self::from_public(public))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    /// Modulus size in bytes.
    pub fn size(&self) -> usize {
        self.public.size()
    }

    pub fn bits(&self) -> usize {
        self.public.n().bits()
    }

    /// Encrypt with the public key.
    ///
    /// # Errors
    /// - `InvalidArgument` if `data` does not fit the scheme
    /// - `Crypto` if the backend fails
    pub fn public_encrypt(&self, padding: RsaPadding, data: &[u8]) -> Result<Vec<u8>> {
        let max = padding.max_payload_len(self.size());
        if data.len() > max {
            return Err(Error::InvalidArgument(format!(
                "Plaintext of {} bytes exceeds {} byte limit",
                data.len(),
                max
            )));
        }

        let mut rng = OsRng;
        match padding {
            RsaPadding::Pkcs1 => self
                .public
                .encrypt(&mut rng, Pkcs1v15Encrypt, data)
                .map_err(backend),
            RsaPadding::Oaep => self
                .public
                .encrypt(&mut rng, Oaep::new::<Sha1>(), data)
                .map_err(backend),
            RsaPadding::None => {
                let m = self.raw_input(data)?;
                let c = rsa_encrypt(&self.public, &m).map_err(backend)?;
                Ok(left_pad(c.to_bytes_be(), self.size()))
            }
        }
    }

    /// Decrypt with the private key.
    ///
    /// # Errors
    /// - `InvalidArgument` if this is a public-only key
    /// - `InvalidArgument` if raw input is not modulus-sized or not below the modulus
    /// - `Crypto` if the backend rejects the ciphertext
    pub fn private_decrypt(&self, padding: RsaPadding, data: &[u8]) -> Result<Vec<u8>> {
        let private = self.private()?;
        match padding {
            RsaPadding::Pkcs1 => private.decrypt(Pkcs1v15Encrypt, data).map_err(backend),
            RsaPadding::Oaep => private.decrypt(Oaep::new::<Sha1>(), data).map_err(backend),
            RsaPadding::None => {
                let c = self.raw_input(data)?;
                let m = rsa_decrypt_and_check(private, Some(&mut OsRng), &c).map_err(backend)?;
                Ok(left_pad(m.to_bytes_be(), self.size()))
            }
        }
    }

    /// Sign a precomputed digest.
    pub fn sign(&self, scheme: Pkcs1v15Sign, hashed: &[u8]) -> Result<Vec<u8>> {
        self.private()?.sign(scheme, hashed).map_err(backend)
    }

    /// Verify a signature over a precomputed digest.
    ///
    /// Any mismatch or malformed signature is reported as `false`.
    pub fn verify(&self, scheme: Pkcs1v15Sign, hashed: &[u8], signature: &[u8]) -> bool {
        self.public.verify(scheme, hashed, signature).is_ok()
    }

    fn private(&self) -> Result<&RsaPrivateKey> {
        self.private
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("RSA key has no private part".to_string()))
    }

    fn raw_input(&self, data: &[u8]) -> Result<BigUint> {
        if data.len() != self.size() {
            return Err(Error::InvalidArgument(format!(
                "Unpadded RSA input must be {} bytes, got {}",
                self.size(),
                data.len()
            )));
        }
        let value = BigUint::from_bytes_be(data);
        if &value >= self.public.n() {
            return Err(Error::InvalidArgument(
                "Unpadded RSA input is not below the modulus".to_string(),
            ));
        }
        Ok(value)
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RsaKey({} bits, private: {})",
            self.bits(),
            if self.has_private() { "[REDACTED]" } else { "none" }
        )
    }
}

/// Named elliptic curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    /// Field element length in bytes.
    pub fn field_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    pub fn bits(self) -> usize {
        match self {
            Self::P256 => 256,
            Self::P384 => 384,
            Self::P521 => 521,
        }
    }

    /// Largest DER-encoded ECDSA signature.
    pub fn max_signature_len(self) -> usize {
        match self {
            Self::P256 => 72,
            Self::P384 => 104,
            Self::P521 => 139,
        }
    }
}

/// Elliptic-curve public key.
///
/// Recognized so that dispatch can name it; no operation is implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcKey {
    curve: EcCurve,
    point: Vec<u8>,
}

impl EcKey {
    /// Wrap an uncompressed SEC1 point (`0x04 || X || Y`).
    ///
    /// # Errors
    /// - `InvalidArgument` if the encoding or length does not match the curve
    pub fn from_public_point(curve: EcCurve, point: &[u8]) -> Result<Self> {
        let expected = 1 + 2 * curve.field_len();
        if point.len() != expected || point[0] != 0x04 {
            return Err(Error::InvalidArgument(format!(
                "Expected a {}-byte uncompressed point for {:?}",
                expected, curve
            )));
        }
        Ok(Self {
            curve,
            point: point.to_vec(),
        })
    }

    pub fn curve(&self) -> EcCurve {
        self.curve
    }

    pub fn public_point(&self) -> &[u8] {
        &self.point
    }
}

/// Asymmetric key, dispatched on its type tag.
#[derive(Debug, Clone)]
pub enum AsymmetricKey {
    Rsa(RsaKey),
    Ec(EcKey),
}

impl AsymmetricKey {
    /// Generate an RSA key pair.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        Ok(Self::Rsa(RsaKey::generate(bits)?))
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::Ec(_) => KeyType::Ec,
        }
    }

    pub fn bits(&self) -> usize {
        match self {
            Self::Rsa(key) => key.bits(),
            Self::Ec(key) => key.curve().bits(),
        }
    }

    /// Largest output any operation on this key produces, in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Rsa(key) => key.size(),
            Self::Ec(key) => key.curve().max_signature_len(),
        }
    }

    pub fn as_rsa(&self) -> Option<&RsaKey> {
        match self {
            Self::Rsa(key) => Some(key),
            Self::Ec(_) => None,
        }
    }
}

impl From<RsaKey> for AsymmetricKey {
    fn from(key: RsaKey) -> Self {
        Self::Rsa(key)
    }
}

impl From<EcKey> for AsymmetricKey {
    fn from(key: EcKey) -> Self {
        Self::Ec(key)
    }
}

fn backend(e: rsa::Error) -> Error {
    Error::Crypto(e.to_string())
}

fn left_pad(bytes: Vec<u8>, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

/// Shared 1024-bit key for unit tests; generation is slow.
#[cfg(test)]
pub(crate) fn test_rsa_key() -> &'static AsymmetricKey {
    use std::sync::OnceLock;

    static KEY: OnceLock<AsymmetricKey> = OnceLock::new();
    KEY.get_or_init(|| AsymmetricKey::generate_rsa(1024).unwrap())
}

#[cfg(test)]
pub(crate) fn test_ec_key() -> AsymmetricKey {
    let mut point = vec![0x04];
    point.extend_from_slice(&[0x11; 64]);
    EcKey::from_public_point(EcCurve::P256, &point).unwrap().into()
}
