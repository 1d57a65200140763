//! Canonical byte encoding fed to the hasher.
//!
//! Layout rules: a leading version byte, fields in declaration order,
//! integers little-endian at fixed width, collection counts as `u32`,
//! variable-length byte strings prefixed with their `u32` length, digests as
//! their raw 32 bytes. Changing any of this changes every hash in the chain,
//! so a new layout must bump [`ENCODING_VERSION`].

use crate::crypto::hash::Hash256;

pub const ENCODING_VERSION: u8 = 1;

#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buf: Vec<u8>,
}

impl CanonicalEncoder {
    pub fn new() -> Self {
        let mut encoder = Self::default();
        encoder.buf.push(ENCODING_VERSION);
        encoder
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_hash(&mut self, hash: &Hash256) -> &mut Self {
        self.buf.extend_from_slice(hash.as_bytes());
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn digest(self) -> Hash256 {
        Hash256::hash(&self.buf)
    }
}
