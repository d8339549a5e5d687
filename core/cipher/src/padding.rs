//! PKCS-style block padding.
//!
//! Every pad byte holds the pad length, which lies in `[1, block size]`.
//! Validation examines every byte of the block no matter where a mismatch
//! sits, so its running time does not reveal the mismatch position.

use subtle::{Choice, ConstantTimeEq, ConstantTimeGreater};

use cryptoshim_common::{Error, Result};

/// Largest block size padding is defined for (the pad value must fit a byte).
pub const MAX_PADDED_BLOCK_SIZE: usize = 255;

/// Applies and validates trailing-block padding.
pub struct PaddingCodec;

impl PaddingCodec {
    /// Pad `block[used..]` with the byte `block.len() - used`.
    ///
    /// Returns the new fill count, which is always the block size.
    ///
    /// # Errors
    /// - `InvalidArgument` if the block size is outside `2..=255`
    /// - `InvalidArgument` if `used` is not below the block size
    pub fn apply(block: &mut [u8], used: usize) -> Result<usize> {
        let block_size = block.len();
        check_block_size(block_size)?;
        if used >= block_size {
            return Err(Error::InvalidArgument(format!(
                "Cannot pad {} byte(s) into a {}-byte block",
                used, block_size
            )));
        }

        let pad = (block_size - used) as u8;
        block[used..].fill(pad);
        Ok(block_size)
    }

    /// Validate the padding of a decrypted final block.
    ///
    /// Returns the number of leading plaintext bytes to keep.
    ///
    /// # Errors
    /// - `InvalidArgument` if the block size is outside `2..=255`
    /// - `PaddingValidationFailure` if the pad length or any pad byte is wrong
    pub fn validate(block: &[u8]) -> Result<usize> {
        let block_size = block.len();
        check_block_size(block_size)?;

        let size = block_size as u8;
        let pad = block[block_size - 1];

        let mut valid = !pad.ct_eq(&0) & !pad.ct_gt(&size);
        for (i, byte) in block.iter().enumerate() {
            // 1 for the last byte, block_size for the first
            let distance = (block_size - i) as u8;
            let in_pad: Choice = !distance.ct_gt(&pad);
            valid &= !in_pad | byte.ct_eq(&pad);
        }

        if bool::from(valid) {
            Ok(block_size - pad as usize)
        } else {
            Err(Error::PaddingValidationFailure)
        }
    }
}

fn check_block_size(block_size: usize) -> Result<()> {
    if block_size < 2 || block_size > MAX_PADDED_BLOCK_SIZE {
        return Err(Error::InvalidArgument(format!(
            "Padding is undefined for block size {}",
            block_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_partial_block() {
        let mut block = [0xAAu8; 16];
        let used = PaddingCodec::apply(&mut block, 13).unwrap();
        assert_eq!(used, 16);
        assert_eq!(&block[..13], &[0xAA; 13]);
        assert_eq!(&block[13..], &[3, 3, 3]);
    }

    #[test]
    fn test_apply_empty_block_adds_full_block() {
        let mut block = [0u8; 8];
        PaddingCodec::apply(&mut block, 0).unwrap();
        assert_eq!(block, [8u8; 8]);
    }

    #[test]
    fn test_apply_rejects_full_block() {
        let mut block = [0u8; 16];
        assert!(PaddingCodec::apply(&mut block, 16).is_err());
    }

    #[test]
    fn test_apply_rejects_stream_block_size() {
        let mut block = [0u8; 1];
        assert!(matches!(
            PaddingCodec::apply(&mut block, 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_accepts_applied_padding() {
        for used in 0..16 {
            let mut block = [0x5Cu8; 16];
            PaddingCodec::apply(&mut block, used).unwrap();
            assert_eq!(PaddingCodec::validate(&block).unwrap(), used);
        }
    }

    #[test]
    fn test_validate_zero_pad_fails() {
        let mut block = [7u8; 16];
        block[15] = 0;
        assert_eq!(
            PaddingCodec::validate(&block),
            Err(Error::PaddingValidationFailure)
        );
    }

    #[test]
    fn test_validate_oversized_pad_fails() {
        let block = [17u8; 16];
        assert_eq!(
            PaddingCodec::validate(&block),
            Err(Error::PaddingValidationFailure)
        );

        let block = [9u8; 8];
        assert_eq!(
            PaddingCodec::validate(&block),
            Err(Error::PaddingValidationFailure)
        );
    }

    #[test]
    fn test_validate_mismatch_anywhere_in_pad_fails() {
        for position in 10..15 {
            let mut block = [0u8; 16];
            PaddingCodec::apply(&mut block, 10).unwrap();
            block[position] ^= 0x01;
            assert_eq!(
                PaddingCodec::validate(&block),
                Err(Error::PaddingValidationFailure),
                "mismatch at {position} accepted"
            );
        }
    }

    #[test]
    fn test_validate_ignores_bytes_before_pad() {
        let mut block = [0xFFu8; 16];
        block[15] = 1;
        assert_eq!(PaddingCodec::validate(&block).unwrap(), 15);
    }

    #[test]
    fn test_validate_full_pad_block() {
        let block = [16u8; 16];
        assert_eq!(PaddingCodec::validate(&block).unwrap(), 0);
    }
}
