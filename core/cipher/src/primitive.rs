//! Keyed cipher primitives.
//!
//! [`Primitive`] is a tagged sum over every supported mode state, each
//! holding a [`KeySchedule`] that is itself a tagged sum over the block
//! ciphers. The streaming engine only ever hands it whole blocks (block
//! modes) or arbitrary byte runs (stream modes).

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use des::{Des, TdesEde3};
use rc4::consts::U16;
use rc4::{Rc4, StreamCipher};
use zeroize::Zeroize;

use crate::block::MAX_BLOCK_SIZE;
use crate::registry::{CipherDescriptor, CipherFamily, ModeClass};
use cryptoshim_common::{Direction, Error, Result};

/// Counter block width for CTR mode.
const CTR_BLOCK_SIZE: usize = 16;

/// Expanded key for one of the block ciphers.
pub(crate) enum KeySchedule {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
    Des(Des),
    TdesEde3(TdesEde3),
}

impl KeySchedule {
    fn new(family: CipherFamily, key: &[u8]) -> Result<Self> {
        let invalid = |_| Error::InvalidArgument(format!("Invalid key length {}", key.len()));
        let schedule = match (family, key.len()) {
            (CipherFamily::Aes, 16) => Self::Aes128(Aes128::new_from_slice(key).map_err(invalid)?),
            (CipherFamily::Aes, 24) => Self::Aes192(Aes192::new_from_slice(key).map_err(invalid)?),
            (CipherFamily::Aes, 32) => Self::Aes256(Aes256::new_from_slice(key).map_err(invalid)?),
            (CipherFamily::Des, 8) => Self::Des(Des::new_from_slice(key).map_err(invalid)?),
            (CipherFamily::TripleDes, 24) => {
                Self::TdesEde3(TdesEde3::new_from_slice(key).map_err(invalid)?)
            }
            (family, len) => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "No block cipher for {:?} with {}-byte key",
                    family, len
                )))
            }
        };
        Ok(schedule)
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes192(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes256(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Des(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::TdesEde3(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes192(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes256(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Des(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::TdesEde3(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
        }
    }
}

/// Keyed mode state, fixed to one direction.
pub(crate) enum Primitive {
    Ecb {
        cipher: KeySchedule,
        direction: Direction,
        block_size: usize,
    },
    Cbc {
        cipher: KeySchedule,
        direction: Direction,
        block_size: usize,
        chain: [u8; MAX_BLOCK_SIZE],
    },
    Ctr {
        cipher: KeySchedule,
        counter: [u8; CTR_BLOCK_SIZE],
        keystream: [u8; CTR_BLOCK_SIZE],
        offset: usize,
    },
    Rc4(Box<Rc4<U16>>),
}

impl Primitive {
    /// Key a primitive for `descriptor`.
    ///
    /// The caller has already checked key and IV lengths against the
    /// descriptor.
    pub(crate) fn new(
        descriptor: &CipherDescriptor,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self> {
        let primitive = match descriptor.mode() {
            ModeClass::Ecb => Self::Ecb {
                cipher: KeySchedule::new(descriptor.family(), key)?,
                direction,
                block_size: descriptor.block_size(),
            },
            ModeClass::Cbc => {
                let mut chain = [0u8; MAX_BLOCK_SIZE];
                chain[..iv.len()].copy_from_slice(iv);
                Self::Cbc {
                    cipher: KeySchedule::new(descriptor.family(), key)?,
                    direction,
                    block_size: descriptor.block_size(),
                    chain,
                }
            }
            ModeClass::Ctr => {
                let mut counter = [0u8; CTR_BLOCK_SIZE];
                counter.copy_from_slice(iv);
                Self::Ctr {
                    cipher: KeySchedule::new(descriptor.family(), key)?,
                    counter,
                    keystream: [0u8; CTR_BLOCK_SIZE],
                    offset: CTR_BLOCK_SIZE,
                }
            }
            ModeClass::Stream => {
                let rc4 = Rc4::<U16>::new_from_slice(key).map_err(|_| {
                    Error::InvalidArgument(format!("Invalid key length {}", key.len()))
                })?;
                Self::Rc4(Box::new(rc4))
            }
        };
        Ok(primitive)
    }

    /// Transform `data` in place.
    ///
    /// Block modes require `data` to be a whole number of blocks.
    pub(crate) fn process(&mut self, data: &mut [u8]) {
        match self {
            Self::Ecb {
                cipher,
                direction,
                block_size,
            } => {
                debug_assert_eq!(data.len() % *block_size, 0);
                for block in data.chunks_exact_mut(*block_size) {
                    match direction {
                        Direction::Encrypt => cipher.encrypt_block(block),
                        Direction::Decrypt => cipher.decrypt_block(block),
                    }
                }
            }
            Self::Cbc {
                cipher,
                direction,
                block_size,
                chain,
            } => {
                debug_assert_eq!(data.len() % *block_size, 0);
                let chain = &mut chain[..*block_size];
                for block in data.chunks_exact_mut(*block_size) {
                    match direction {
                        Direction::Encrypt => {
                            xor_in_place(block, chain);
                            cipher.encrypt_block(block);
                            chain.copy_from_slice(block);
                        }
                        Direction::Decrypt => {
                            let mut saved = [0u8; MAX_BLOCK_SIZE];
                            saved[..block.len()].copy_from_slice(block);
                            cipher.decrypt_block(block);
                            xor_in_place(block, chain);
                            chain.copy_from_slice(&saved[..block.len()]);
                        }
                    }
                }
            }
            Self::Ctr {
                cipher,
                counter,
                keystream,
                offset,
            } => {
                for byte in data.iter_mut() {
                    if *offset == CTR_BLOCK_SIZE {
                        keystream.copy_from_slice(&counter[..]);
                        cipher.encrypt_block(keystream);
                        increment_counter(counter);
                        *offset = 0;
                    }
                    *byte ^= keystream[*offset];
                    *offset += 1;
                }
            }
            Self::Rc4(rc4) => rc4.apply_keystream(data),
        }
    }
}

impl Drop for Primitive {
    fn drop(&mut self) {
        match self {
            Self::Cbc { chain, .. } => chain.zeroize(),
            Self::Ctr {
                counter, keystream, ..
            } => {
                counter.zeroize();
                keystream.zeroize();
            }
            Self::Ecb { .. } | Self::Rc4(_) => {}
        }
    }
}

fn xor_in_place(block: &mut [u8], mask: &[u8]) {
    for (b, m) in block.iter_mut().zip(mask) {
        *b ^= m;
    }
}

/// Big-endian increment over the whole counter block.
fn increment_counter(counter: &mut [u8; CTR_BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CipherId;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn primitive(id: CipherId, direction: Direction, key: &[u8], iv: &[u8]) -> Primitive {
        Primitive::new(&id.descriptor(), direction, key, iv).unwrap()
    }

    #[test]
    fn test_aes128_ecb_known_answer() {
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let mut data = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        primitive(CipherId::Aes128Ecb, Direction::Encrypt, &key, &[]).process(&mut data);
        assert_eq!(
            data,
            hex("3ad77bb40d7a3660a89ecaf32466ef97f5d3d58503b9699de785895a96fdbaaf")
        );
    }

    #[test]
    fn test_aes128_cbc_known_answer_across_calls() {
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let iv = hex("000102030405060708090a0b0c0d0e0f");
        let mut enc = primitive(CipherId::Aes128Cbc, Direction::Encrypt, &key, &iv);

        let mut first = hex("6bc1bee22e409f96e93d7e117393172a");
        let mut second = hex("ae2d8a571e03ac9c9eb76fac45af8e51");
        enc.process(&mut first);
        enc.process(&mut second);

        assert_eq!(first, hex("7649abac8119b246cee98e9b12e9197d"));
        assert_eq!(second, hex("5086cb9b507219ee95db113a917678b2"));

        let mut dec = primitive(CipherId::Aes128Cbc, Direction::Decrypt, &key, &iv);
        let mut both = [first, second].concat();
        dec.process(&mut both);
        assert_eq!(
            both,
            hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51")
        );
    }

    #[test]
    fn test_aes128_ctr_known_answer_split_mid_block() {
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let iv = hex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
        let mut ctr = primitive(CipherId::Aes128Ctr, Direction::Encrypt, &key, &iv);

        let mut data = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let (head, tail) = data.split_at_mut(5);
        ctr.process(head);
        ctr.process(tail);

        assert_eq!(
            data,
            hex("874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff")
        );
    }

    #[test]
    fn test_des_ecb_known_answer() {
        let key = hex("133457799bbcdff1");
        let mut data = hex("0123456789abcdef");
        primitive(CipherId::DesEcb, Direction::Encrypt, &key, &[]).process(&mut data);
        assert_eq!(data, hex("85e813540f0ab405"));
    }

    #[test]
    fn test_tdes_with_repeated_key_matches_des() {
        let key = hex("133457799bbcdff1");
        let mut single = hex("0123456789abcdef");
        primitive(CipherId::DesEcb, Direction::Encrypt, &key, &[]).process(&mut single);

        let triple_key = key.repeat(3);
        let mut triple = hex("0123456789abcdef");
        primitive(CipherId::DesEde3Ecb, Direction::Encrypt, &triple_key, &[]).process(&mut triple);

        assert_eq!(single, triple);
    }

    #[test]
    fn test_rc4_is_its_own_inverse() {
        let key = [7u8; 16];
        let mut data = b"byte stream payload".to_vec();
        primitive(CipherId::Rc4, Direction::Encrypt, &key, &[]).process(&mut data);
        assert_ne!(&data[..], b"byte stream payload");
        primitive(CipherId::Rc4, Direction::Decrypt, &key, &[]).process(&mut data);
        assert_eq!(&data[..], b"byte stream payload");
    }

    #[test]
    fn test_counter_wraps() {
        let mut counter = [0xFFu8; CTR_BLOCK_SIZE];
        increment_counter(&mut counter);
        assert_eq!(counter, [0u8; CTR_BLOCK_SIZE]);

        let mut counter = [0u8; CTR_BLOCK_SIZE];
        counter[15] = 0xFF;
        increment_counter(&mut counter);
        assert_eq!(counter[14], 1);
        assert_eq!(counter[15], 0);
    }

    #[test]
    fn test_wrong_key_length_rejected() {
        let result = Primitive::new(
            &CipherId::Aes128Ecb.descriptor(),
            Direction::Encrypt,
            &[0u8; 15],
            &[],
        );
        assert!(result.is_err());
    }
}
