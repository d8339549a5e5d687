//! Asymmetric key operations for cryptoshim.
//!
//! RSA keys back encrypt/decrypt contexts and digest-then-sign contexts.
//! EC keys are recognized and report their sizes, but every operation on
//! them returns [`cryptoshim_common::Error::NotImplemented`].

pub mod digest;
pub mod key;
pub mod ops;
pub mod signature;

pub use digest::{digest, DigestAlgorithm, DigestContext};
pub use key::{AsymmetricKey, EcCurve, EcKey, KeyType, RsaKey, RsaPadding, MIN_RSA_BITS};
pub use ops::{KeyOperationContext, OperationKind};
pub use signature::{SignatureContext, SignatureState};
