//! Repeating-key XOR payload transform.
//!
//! Every payload on an xorlink connection is XOR-ed byte-by-byte with a
//! shared key that both peers know out of band. The transform is its own
//! inverse: applying it twice with the same key restores the input.
//!
//! # Not encryption
//!
//! This is obfuscation only. A repeating-key XOR gives no confidentiality
//! and no integrity: one known plaintext reveals the key, and frequency
//! analysis recovers it from ciphertext alone. Do not rely on it for
//! secrecy.

pub mod error;
pub mod key;

pub use error::{Result, TransformError};
pub use key::{Key, DEFAULT_KEY};

/// XOR `buffer` in place with `key`, repeating the key as needed.
///
/// Byte `i` is XOR-ed with `key[i % key.len()]`. An empty buffer is a
/// no-op. An empty key is rejected instead of silently leaving the buffer
/// untouched.
pub fn transform(buffer: &mut [u8], key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(TransformError::EmptyKey);
    }
    for (byte, k) in buffer.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
    Ok(())
}
