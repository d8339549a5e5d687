//! Fixed-capacity block buffer.
//!
//! Holds at most one cipher block. The fill count can never exceed the
//! capacity, and cleared or dropped contents are zeroized.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::padding::PaddingCodec;
use cryptoshim_common::{Error, Result};

/// Largest block size of any supported cipher.
pub const MAX_BLOCK_SIZE: usize = 16;

/// One block of storage with an explicit fill count.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BlockBuffer {
    bytes: [u8; MAX_BLOCK_SIZE],
    #[zeroize(skip)]
    capacity: usize,
    used: usize,
}

impl BlockBuffer {
    /// Create an empty buffer holding `capacity` bytes.
    ///
    /// # Errors
    /// - `InvalidArgument` if `capacity` is 0 or above [`MAX_BLOCK_SIZE`]
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_BLOCK_SIZE {
            return Err(Error::InvalidArgument(format!(
                "Block size {} outside 1..={}",
                capacity, MAX_BLOCK_SIZE
            )));
        }
        Ok(Self {
            bytes: [0u8; MAX_BLOCK_SIZE],
            capacity,
            used: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used == self.capacity
    }

    /// Bytes still free.
    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// Append as much of `input` as fits. Returns the bytes consumed.
    pub fn fill(&mut self, input: &[u8]) -> usize {
        let take = input.len().min(self.remaining());
        self.bytes[self.used..self.used + take].copy_from_slice(&input[..take]);
        self.used += take;
        take
    }

    /// Replace the contents with `block`, which must fit.
    pub fn replace(&mut self, block: &[u8]) -> Result<()> {
        if block.len() > self.capacity {
            return Err(Error::InvalidArgument(format!(
                "{} byte(s) exceed block capacity {}",
                block.len(),
                self.capacity
            )));
        }
        self.clear();
        self.fill(block);
        Ok(())
    }

    /// Pad the buffer up to its capacity.
    pub fn pad(&mut self) -> Result<()> {
        self.used = PaddingCodec::apply(&mut self.bytes[..self.capacity], self.used)?;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.used]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.used]
    }

    /// Zeroize the contents and reset the fill count.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.used = 0;
    }
}

impl std::fmt::Debug for BlockBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlockBuffer([REDACTED; {}/{} bytes])",
            self.used, self.capacity
        )
    }
}
