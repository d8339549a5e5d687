//! Streaming symmetric cipher transform.
//!
//! A [`CipherTransform`] accepts input in arbitrary chunks and produces the
//! same output as if the concatenated input had been supplied in one call.
//!
//! # Block handling
//! - Bytes short of a full block wait in a pending buffer.
//! - When decrypting with padding enabled, the most recent decrypted block
//!   is withheld until more input proves it is not the padded final block.
//! - `finalize` pads (encrypt) or validates and strips the padding of the
//!   withheld block (decrypt).
//!
//! Byte-stream ciphers (block size 1) never buffer, withhold or pad.
//!
//! # Security
//! - Buffered plaintext and ciphertext are zeroized when released
//! - Padding failures report one undifferentiated error

use std::fmt;

use tracing::{debug, trace};

use crate::block::BlockBuffer;
use crate::padding::PaddingCodec;
use crate::primitive::Primitive;
use crate::registry::CipherDescriptor;
use cryptoshim_common::{Direction, Error, Result};

/// Lifecycle of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    /// Created or reset; padding may still be changed.
    Fresh,
    /// At least one update has run.
    Updating,
    /// Finalized; only `reset` is accepted.
    Finalized,
}

/// One encryption or decryption session.
pub struct CipherTransform {
    descriptor: CipherDescriptor,
    direction: Direction,
    primitive: Primitive,
    padding: bool,
    pending: BlockBuffer,
    withheld: BlockBuffer,
    withheld_valid: bool,
    state: TransformState,
}

impl CipherTransform {
    /// Create a transform for a resolved cipher.
    ///
    /// Padding starts enabled.
    ///
    /// # Preconditions
    /// - `key` must be exactly `descriptor.key_len()` bytes
    /// - `iv` must be exactly `descriptor.iv_len()` bytes when that is non-zero;
    ///   it is ignored otherwise
    ///
    /// # Errors
    /// - `InvalidArgument` on a key or IV length mismatch
    pub fn new(
        descriptor: &CipherDescriptor,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self> {
        let primitive = keyed_primitive(descriptor, direction, key, iv)?;
        let block_size = descriptor.block_size();

        debug!(cipher = %descriptor.id(), %direction, "cipher transform created");

        Ok(Self {
            descriptor: *descriptor,
            direction,
            primitive,
            padding: true,
            pending: BlockBuffer::new(block_size)?,
            withheld: BlockBuffer::new(block_size)?,
            withheld_valid: false,
            state: TransformState::Fresh,
        })
    }

    /// Create an encrypting transform.
    pub fn encrypt(descriptor: &CipherDescriptor, key: &[u8], iv: &[u8]) -> Result<Self> {
        Self::new(descriptor, Direction::Encrypt, key, iv)
    }

    /// Create a decrypting transform.
    pub fn decrypt(descriptor: &CipherDescriptor, key: &[u8], iv: &[u8]) -> Result<Self> {
        Self::new(descriptor, Direction::Decrypt, key, iv)
    }

    pub fn descriptor(&self) -> &CipherDescriptor {
        &self.descriptor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn block_size(&self) -> usize {
        self.descriptor.block_size()
    }

    pub fn padding(&self) -> bool {
        self.padding
    }

    pub fn state(&self) -> TransformState {
        self.state
    }

    /// Enable or disable padding.
    ///
    /// # Errors
    /// - `OperationStateMismatch` once `update` has been called
    pub fn set_padding(&mut self, enabled: bool) -> Result<()> {
        if self.state != TransformState::Fresh {
            return Err(Error::OperationStateMismatch(
                "Padding can only be changed before the first update".to_string(),
            ));
        }
        self.padding = enabled;
        Ok(())
    }

    /// Re-key the transform and discard all buffered state.
    ///
    /// The descriptor and direction are kept; padding is re-enabled.
    pub fn reset(&mut self, key: &[u8], iv: &[u8]) -> Result<()> {
        self.primitive = keyed_primitive(&self.descriptor, self.direction, key, iv)?;
        self.pending.clear();
        self.withheld.clear();
        self.withheld_valid = false;
        self.padding = true;
        self.state = TransformState::Fresh;
        trace!(cipher = %self.descriptor.id(), "cipher transform reset");
        Ok(())
    }

    /// Exact number of bytes the next `update` of `input_len` bytes writes.
    pub fn update_len(&self, input_len: usize) -> usize {
        let block_size = self.block_size();
        if input_len == 0 || self.state == TransformState::Finalized {
            return 0;
        }
        if block_size == 1 {
            return input_len;
        }

        let withholds = self.withholds();
        let mut remaining = input_len;
        let mut produced = 0;
        let mut held = self.withheld_valid;

        let mut filled = false;
        if !self.pending.is_empty() {
            let taken = remaining.min(self.pending.remaining());
            remaining -= taken;
            filled = taken == self.pending.remaining();
        }
        if held {
            produced += block_size;
            held = false;
        }
        if filled {
            if withholds {
                held = true;
            } else {
                produced += block_size;
            }
        }

        let blocks = remaining / block_size;
        if blocks > 0 {
            if withholds {
                if held {
                    produced += block_size;
                }
                produced += (blocks - 1) * block_size;
            } else {
                produced += blocks * block_size;
            }
        }
        produced
    }

    /// Upper bound on the bytes `finalize` writes.
    pub fn final_len(&self) -> usize {
        if self.state == TransformState::Finalized || !self.padding || self.block_size() == 1 {
            0
        } else {
            self.block_size()
        }
    }

    /// Feed input, writing every byte that can be released to `output`.
    ///
    /// Returns the number of bytes written, which always equals
    /// `update_len(input.len())`.
    ///
    /// # Errors
    /// - `OperationStateMismatch` if the transform is finalized
    /// - `InvalidArgument` if `output` is shorter than `update_len(input.len())`;
    ///   the transform is left unchanged
    pub fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;
        let required = self.update_len(input.len());
        check_output(output, required)?;
        self.state = TransformState::Updating;

        if input.is_empty() {
            return Ok(0);
        }

        let block_size = self.block_size();
        if block_size == 1 {
            let out = &mut output[..input.len()];
            out.copy_from_slice(input);
            self.primitive.process(out);
            return Ok(input.len());
        }

        let withholds = self.withholds();
        let mut input = input;
        let mut written = 0;

        if !self.pending.is_empty() {
            let taken = self.pending.fill(input);
            input = &input[taken..];
        }

        // Any further input proves the withheld block was not the last one.
        if self.withheld_valid {
            written += self.release_withheld(&mut output[written..]);
        }

        if self.pending.is_full() {
            self.primitive.process(self.pending.as_mut_slice());
            if withholds {
                self.withheld.replace(self.pending.as_slice())?;
                self.withheld_valid = true;
            } else {
                output[written..written + block_size].copy_from_slice(self.pending.as_slice());
                written += block_size;
                if self.direction == Direction::Decrypt {
                    self.withheld.replace(self.pending.as_slice())?;
                }
            }
            self.pending.clear();
        }

        let blocks = input.len() / block_size;
        if blocks > 0 {
            let bulk = blocks * block_size;
            let (full, rest) = input.split_at(bulk);

            if withholds {
                if self.withheld_valid {
                    written += self.release_withheld(&mut output[written..]);
                }
                let (head, last) = full.split_at(bulk - block_size);
                let out = &mut output[written..written + head.len()];
                out.copy_from_slice(head);
                self.primitive.process(out);
                written += head.len();

                self.withheld.replace(last)?;
                self.primitive.process(self.withheld.as_mut_slice());
                self.withheld_valid = true;
            } else {
                let out = &mut output[written..written + bulk];
                out.copy_from_slice(full);
                self.primitive.process(out);
                written += bulk;
                if self.direction == Direction::Decrypt {
                    self.withheld.replace(&out[bulk - block_size..])?;
                }
            }
            input = rest;
        }

        debug_assert!(input.len() < block_size);
        self.pending.fill(input);

        debug_assert_eq!(written, required);
        Ok(written)
    }

    /// Flush buffered state, padding or unpadding as configured.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// - `OperationStateMismatch` if the transform is already finalized
    /// - `InvalidArgument` if `output` is shorter than `final_len()`
    /// - `BufferMisalignment` if a partial block is pending where none may
    ///   be; the transform is left unchanged and can take more input
    /// - `PaddingValidationFailure` if decrypted padding is malformed or no
    ///   padded block was ever received; the transform is finalized
    pub fn finalize(&mut self, output: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;
        check_output(output, self.final_len())?;

        let block_size = self.block_size();
        if block_size == 1 {
            self.finish();
            return Ok(0);
        }

        if !self.pending.is_empty() && !(self.padding && self.direction.is_encrypt()) {
            debug!(
                cipher = %self.descriptor.id(),
                pending = self.pending.len(),
                "finalize with partial block pending"
            );
            return Err(Error::BufferMisalignment {
                pending: self.pending.len(),
                block_size,
            });
        }

        if !self.padding {
            self.finish();
            return Ok(0);
        }

        match self.direction {
            Direction::Encrypt => {
                self.pending.pad()?;
                self.primitive.process(self.pending.as_mut_slice());
                output[..block_size].copy_from_slice(self.pending.as_slice());
                self.finish();
                Ok(block_size)
            }
            Direction::Decrypt => {
                let result = if self.withheld_valid {
                    PaddingCodec::validate(self.withheld.as_slice())
                } else {
                    Err(Error::PaddingValidationFailure)
                };
                let written = match result {
                    Ok(keep) => {
                        output[..keep].copy_from_slice(&self.withheld.as_slice()[..keep]);
                        Ok(keep)
                    }
                    Err(err) => {
                        debug!(cipher = %self.descriptor.id(), "padding validation failed");
                        Err(err)
                    }
                };
                self.finish();
                written
            }
        }
    }

    /// Feed input and collect the released bytes.
    pub fn update_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; self.update_len(input.len())];
        let written = self.update(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    /// Finalize and collect the remaining bytes.
    pub fn finalize_vec(&mut self) -> Result<Vec<u8>> {
        let mut output = vec![0u8; self.final_len()];
        let written = self.finalize(&mut output)?;
        output.truncate(written);
        Ok(output)
    }

    fn withholds(&self) -> bool {
        self.padding && self.direction == Direction::Decrypt
    }

    fn release_withheld(&mut self, output: &mut [u8]) -> usize {
        let len = self.withheld.len();
        output[..len].copy_from_slice(self.withheld.as_slice());
        self.withheld.clear();
        self.withheld_valid = false;
        len
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state == TransformState::Finalized {
            return Err(Error::OperationStateMismatch(
                "Cipher transform is already finalized".to_string(),
            ));
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.pending.clear();
        self.withheld.clear();
        self.withheld_valid = false;
        self.state = TransformState::Finalized;
        trace!(cipher = %self.descriptor.id(), "cipher transform finalized");
    }
}

impl fmt::Debug for CipherTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherTransform")
            .field("cipher", &self.descriptor.id())
            .field("direction", &self.direction)
            .field("padding", &self.padding)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn keyed_primitive(
    descriptor: &CipherDescriptor,
    direction: Direction,
    key: &[u8],
    iv: &[u8],
) -> Result<Primitive> {
    if key.len() != descriptor.key_len() {
        return Err(Error::InvalidArgument(format!(
            "{} requires a {}-byte key, got {}",
            descriptor.id(),
            descriptor.key_len(),
            key.len()
        )));
    }
    let iv = match descriptor.iv_len() {
        0 => &[][..],
        len if iv.len() == len => iv,
        len => {
            return Err(Error::InvalidArgument(format!(
                "{} requires a {}-byte IV, got {}",
                descriptor.id(),
                len,
                iv.len()
            )))
        }
    };
    Primitive::new(descriptor, direction, key, iv)
}

fn check_output(output: &[u8], required: usize) -> Result<()> {
    if output.len() < required {
        return Err(Error::InvalidArgument(format!(
            "Output buffer too small: need {}, got {}",
            required,
            output.len()
        )));
    }
    Ok(())
}

/// Encrypt a complete byte slice with padding enabled.
///
/// This is a convenience function for when the complete data is available.
pub fn encrypt_bytes(
    descriptor: &CipherDescriptor,
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut transform = CipherTransform::encrypt(descriptor, key, iv)?;
    let mut output = transform.update_vec(data)?;
    output.extend_from_slice(&transform.finalize_vec()?);
    Ok(output)
}

/// Decrypt a complete byte slice that was encrypted with padding enabled.
pub fn decrypt_bytes(
    descriptor: &CipherDescriptor,
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut transform = CipherTransform::decrypt(descriptor, key, iv)?;
    let mut output = transform.update_vec(data)?;
    output.extend_from_slice(&transform.finalize_vec()?);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CipherId;

    const KEY: [u8; 16] = [0x42; 16];
    const IV: [u8; 16] = [0x24; 16];

    fn aes_cbc() -> CipherDescriptor {
        CipherId::Aes128Cbc.descriptor()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"Hello, block cipher streaming!";

        let ciphertext = encrypt_bytes(&aes_cbc(), &KEY, &IV, plaintext).unwrap();
        assert_eq!(ciphertext.len(), 32);

        let decrypted = decrypt_bytes(&aes_cbc(), &KEY, &IV, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_aligned_plaintext_gains_full_pad_block() {
        let ciphertext = encrypt_bytes(&aes_cbc(), &KEY, &IV, &[0u8; 32]).unwrap();
        assert_eq!(ciphertext.len(), 48);
    }

    #[test]
    fn test_decrypt_withholds_last_block() {
        let ciphertext = encrypt_bytes(&aes_cbc(), &KEY, &IV, &[9u8; 20]).unwrap();
        let mut dec = CipherTransform::decrypt(&aes_cbc(), &KEY, &IV).unwrap();

        assert_eq!(dec.update_len(16), 0);
        assert!(dec.update_vec(&ciphertext[..16]).unwrap().is_empty());

        // The second block releases the first and is withheld itself.
        assert_eq!(dec.update_len(16), 16);
        assert_eq!(dec.update_vec(&ciphertext[16..]).unwrap(), vec![9u8; 16]);

        assert_eq!(dec.finalize_vec().unwrap(), vec![9u8; 4]);
    }

    #[test]
    fn test_update_len_matches_update() {
        let ciphertext = encrypt_bytes(&aes_cbc(), &KEY, &IV, &[1u8; 70]).unwrap();
        let mut dec = CipherTransform::decrypt(&aes_cbc(), &KEY, &IV).unwrap();
        for chunk in ciphertext.chunks(7) {
            let expected = dec.update_len(chunk.len());
            assert_eq!(dec.update_vec(chunk).unwrap().len(), expected);
        }
        assert_eq!(dec.finalize_vec().unwrap().len(), 70 % 16);
    }

    #[test]
    fn test_short_output_buffer_leaves_state_untouched() {
        let mut enc = CipherTransform::encrypt(&aes_cbc(), &KEY, &IV).unwrap();
        let mut small = [0u8; 8];
        assert!(matches!(
            enc.update(&[0u8; 20], &mut small),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(enc.state(), TransformState::Fresh);

        let mut output = [0u8; 16];
        assert_eq!(enc.update(&[0u8; 20], &mut output).unwrap(), 16);
    }

    #[test]
    fn test_set_padding_after_update_fails() {
        let mut enc = CipherTransform::encrypt(&aes_cbc(), &KEY, &IV).unwrap();
        enc.set_padding(false).unwrap();
        enc.update_vec(b"abc").unwrap();
        assert!(matches!(
            enc.set_padding(true),
            Err(Error::OperationStateMismatch(_))
        ));
        assert!(!enc.padding());
    }

    #[test]
    fn test_misaligned_final_can_be_completed() {
        let mut enc = CipherTransform::encrypt(&aes_cbc(), &KEY, &IV).unwrap();
        enc.set_padding(false).unwrap();
        enc.update_vec(&[3u8; 5]).unwrap();

        assert_eq!(
            enc.finalize_vec(),
            Err(Error::BufferMisalignment {
                pending: 5,
                block_size: 16
            })
        );
        assert_eq!(enc.state(), TransformState::Updating);

        assert_eq!(enc.update_vec(&[3u8; 11]).unwrap().len(), 16);
        assert!(enc.finalize_vec().unwrap().is_empty());
    }

    #[test]
    fn test_finalize_twice_fails() {
        let mut enc = CipherTransform::encrypt(&aes_cbc(), &KEY, &IV).unwrap();
        enc.finalize_vec().unwrap();
        assert!(matches!(
            enc.finalize_vec(),
            Err(Error::OperationStateMismatch(_))
        ));
        assert!(matches!(
            enc.update_vec(b"more"),
            Err(Error::OperationStateMismatch(_))
        ));
    }

    #[test]
    fn test_decrypt_final_without_any_block() {
        let mut dec = CipherTransform::decrypt(&aes_cbc(), &KEY, &IV).unwrap();
        assert_eq!(dec.finalize_vec(), Err(Error::PaddingValidationFailure));
        assert_eq!(dec.state(), TransformState::Finalized);
    }

    #[test]
    fn test_decrypt_final_with_partial_block() {
        let mut dec = CipherTransform::decrypt(&aes_cbc(), &KEY, &IV).unwrap();
        dec.update_vec(&[0u8; 7]).unwrap();
        assert_eq!(
            dec.finalize_vec(),
            Err(Error::BufferMisalignment {
                pending: 7,
                block_size: 16
            })
        );
    }

    #[test]
    fn test_forced_pad_bytes() {
        // 20 bytes of plaintext leave 12 bytes of padding in the last block.
        let ciphertext = encrypt_bytes(&aes_cbc(), &KEY, &IV, &[0xA5u8; 20]).unwrap();

        let mut zero_pad = ciphertext.clone();
        zero_pad[15] ^= 12;
        assert_eq!(
            decrypt_bytes(&aes_cbc(), &KEY, &IV, &zero_pad),
            Err(Error::PaddingValidationFailure)
        );

        let mut oversized = ciphertext.clone();
        oversized[15] ^= 12 ^ 17;
        assert_eq!(
            decrypt_bytes(&aes_cbc(), &KEY, &IV, &oversized),
            Err(Error::PaddingValidationFailure)
        );

        let mut single_pad = ciphertext;
        single_pad[15] ^= 12 ^ 1;
        let decrypted = decrypt_bytes(&aes_cbc(), &KEY, &IV, &single_pad).unwrap();
        assert_eq!(decrypted.len(), 31);
    }

    #[test]
    fn test_stream_cipher_final_is_empty() {
        let rc4 = CipherId::Rc4.descriptor();
        for padding in [true, false] {
            let mut enc = CipherTransform::encrypt(&rc4, &KEY, &[]).unwrap();
            enc.set_padding(padding).unwrap();
            assert_eq!(enc.update_vec(b"odd-length").unwrap().len(), 10);
            assert_eq!(enc.final_len(), 0);
            assert!(enc.finalize_vec().unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_key_and_iv_lengths() {
        assert!(CipherTransform::encrypt(&aes_cbc(), &KEY[..15], &IV).is_err());
        assert!(CipherTransform::encrypt(&aes_cbc(), &KEY, &IV[..8]).is_err());
        // ECB ignores the IV.
        let ecb = CipherId::Aes128Ecb.descriptor();
        assert!(CipherTransform::encrypt(&ecb, &KEY, &IV[..3]).is_ok());
    }

    #[test]
    fn test_reset_restarts_session() {
        let mut enc = CipherTransform::encrypt(&aes_cbc(), &KEY, &IV).unwrap();
        let first = {
            let mut out = enc.update_vec(b"reset me").unwrap();
            out.extend(enc.finalize_vec().unwrap());
            out
        };

        enc.reset(&KEY, &IV).unwrap();
        assert_eq!(enc.state(), TransformState::Fresh);
        let mut second = enc.update_vec(b"reset me").unwrap();
        second.extend(enc.finalize_vec().unwrap());

        assert_eq!(first, second);
    }

    #[test]
    fn test_debug_omits_buffers() {
        let enc = CipherTransform::encrypt(&aes_cbc(), &KEY, &IV).unwrap();
        let debug = format!("{:?}", enc);
        assert!(debug.contains("Aes128Cbc"));
        assert!(!debug.contains("pending"));
    }
}
