//! Thin wrappers over the `Crypto` capability's SHA-256, used by every
//! deterministic-id and commitment computation in the core.

use bitcoin::hashes::{sha256, Hash};

/// `SHA-256(data)`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256::Hash::hash(data).to_byte_array()
}

/// `SHA-256` over the concatenation of several byte slices, without an
/// intermediate allocation per caller.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    use bitcoin::hashes::HashEngine;
    let mut engine = sha256::Hash::engine();
    for part in parts {
        engine.input(part);
    }
    sha256::Hash::from_engine(engine).to_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_matches_manual_concat() {
        let a = b"hello ";
        let b = b"world";
        let concatenated = sha256_concat(&[a, b]);
        let mut joined = Vec::new();
        joined.extend_from_slice(a);
        joined.extend_from_slice(b);
        assert_eq!(concatenated, sha256(&joined));
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256(b"abc"), sha256(b"abc"));
        assert_ne!(sha256(b"abc"), sha256(b"abd"));
    }
}
