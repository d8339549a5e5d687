//! Common error types for cryptoshim.

use thiserror::Error;

/// Top-level error type for cryptoshim operations.
///
/// Every failure is an ordinary return value; none of them leaves an
/// instance in a state that is unsafe to drop or re-initialize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A context, key, buffer or length argument was unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cipher, key type or digest identifier could not be resolved.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Finalization without padding found a partial block still pending.
    #[error("Buffer misalignment: {pending} byte(s) pending for block size {block_size}")]
    BufferMisalignment { pending: usize, block_size: usize },

    /// The final decrypted block did not carry valid padding.
    ///
    /// Carries no detail so that every padding failure looks the same.
    #[error("Padding validation failed")]
    PaddingValidationFailure,

    /// The key type is recognized but the operation has no implementation.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The call does not match the state the instance was initialized for.
    #[error("Operation state mismatch: {0}")]
    OperationStateMismatch(String),

    /// An underlying primitive reported failure.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misalignment_message_reports_counts() {
        let err = Error::BufferMisalignment {
            pending: 5,
            block_size: 16,
        };
        assert_eq!(
            err.to_string(),
            "Buffer misalignment: 5 byte(s) pending for block size 16"
        );
    }

    #[test]
    fn test_padding_failure_has_no_detail() {
        assert_eq!(
            Error::PaddingValidationFailure.to_string(),
            "Padding validation failed"
        );
    }
}
