//! The symmetric primitives the scheme is built on.
//!
//! - A PRF, AES-128 in counter mode, used to expand short keys into group keys and scalars.
//! - A keyed hash, BLAKE2b in keyed mode, used for nonces, selection digests and challenges.
use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes128,
};
use blake2::Blake2bVarCore;
use digest::{
    core_api::{Block, Buffer, UpdateCore, VariableOutputCore},
    Output,
};

use crate::constants::{KEY_LEN, MAX_HASH_LEN, PRF_OUTPUT_LEN};

/// Only the first half of a 32 byte key feeds the block cipher.
const AES_KEY_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;

/// A keyed pseudorandom function, producing a keystream indexed by a counter.
#[derive(Clone)]
pub struct Prf {
    cipher: Aes128,
}

impl Prf {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(&key[..AES_KEY_LEN]));
        Self { cipher }
    }

    /// Expand the key at a given counter.
    ///
    /// This encrypts the blocks `counter` and `counter + 1`, each encoded as a
    /// little endian 128 bit integer, and concatenates the results.
    pub fn expand(&self, counter: u64) -> [u8; PRF_OUTPUT_LEN] {
        let mut out = [0u8; PRF_OUTPUT_LEN];
        for (i, chunk) in out.chunks_exact_mut(AES_BLOCK_LEN).enumerate() {
            let mut block = aes::Block::default();
            block[..8].copy_from_slice(&counter.wrapping_add(i as u64).to_le_bytes());
            self.cipher.encrypt_block(&mut block);
            chunk.copy_from_slice(&block);
        }
        out
    }
}

/// Hash a message under a key, filling `out` completely.
///
/// The output length is part of the BLAKE2b parameter block, so a shorter
/// output is *not* a prefix of a longer one.
///
/// Both the key and the output must be at most 64 bytes, and the output can't be empty.
pub fn keyed_hash(key: &[u8], message: &[u8], out: &mut [u8]) {
    debug_assert!(key.len() <= MAX_HASH_LEN);
    debug_assert!(!out.is_empty() && out.len() <= MAX_HASH_LEN);

    let mut core = Blake2bVarCore::new_with_params(&[], &[], key.len(), out.len());
    let mut buffer = if key.is_empty() {
        Buffer::<Blake2bVarCore>::default()
    } else {
        // The key occupies a full block of its own, processed before the message.
        let mut padded_key = Block::<Blake2bVarCore>::default();
        padded_key[..key.len()].copy_from_slice(key);
        Buffer::<Blake2bVarCore>::new(&padded_key)
    };
    buffer.digest_blocks(message, |blocks| core.update_blocks(blocks));

    let mut full = Output::<Blake2bVarCore>::default();
    core.finalize_variable_core(&mut buffer, &mut full);
    out.copy_from_slice(&full[..out.len()]);
}

/// Like [keyed_hash], with a fixed output size.
pub fn keyed_hash_array<const N: usize>(key: &[u8], message: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    keyed_hash(key, message, &mut out);
    out
}
