//! Serialization primitives: fixed-width crypto values to/from hex, with
//! the byte-wise ordering the protocol's "sort by compressed encoding"
//! rule depends on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

fn from_hex_exact<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    let bytes = hex::decode(s).map_err(|e| CoreError::InvalidPayload(format!("bad hex: {e}")))?;
    if bytes.len() != N {
        return Err(CoreError::InvalidPayload(format!(
            "expected {N} bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A compressed secp256k1 public key: 0x02/0x03 prefix + 32-byte x-coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKeyBytes(pub [u8; 33]);

impl PublicKeyBytes {
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(from_hex_exact(s)?))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    pub fn to_secp(&self) -> Result<secp256k1::PublicKey, CoreError> {
        secp256k1::PublicKey::from_slice(&self.0)
            .map_err(|e| CoreError::InvalidPayload(format!("bad public key: {e}")))
    }

    pub fn from_secp(pk: &secp256k1::PublicKey) -> Self {
        Self(pk.serialize())
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte big-endian scalar mod the secp256k1 group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarBytes(pub [u8; 32]);

impl ScalarBytes {
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(from_hex_exact(s)?))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl Serialize for ScalarBytes {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ScalarBytes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte `r‖s` Schnorr signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureBytes(pub [u8; 64]);

impl SignatureBytes {
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(from_hex_exact(s)?))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A MuSig2 public nonce pair `(R1, R2)`, each a compressed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicNonceBytes(pub [u8; 66]);

impl PublicNonceBytes {
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(from_hex_exact(s)?))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    pub fn r1(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(&self.0[..33]);
        out
    }

    pub fn r2(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(&self.0[33..]);
        out
    }
}

impl Serialize for PublicNonceBytes {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicNonceBytes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Sort a slice of compressed public keys into the canonical order the
/// key-aggregation and session-id rules require.
pub fn sort_pubkeys(keys: &mut [PublicKeyBytes]) {
    keys.sort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_hex_roundtrip() {
        let bytes = [0x02u8; 33];
        let pk = PublicKeyBytes(bytes);
        let hex = pk.to_hex();
        let recovered = PublicKeyBytes::from_hex(&hex).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn scalar_hex_roundtrip() {
        let bytes = [0xAB; 32];
        let s = ScalarBytes(bytes);
        assert_eq!(ScalarBytes::from_hex(&s.to_hex()).unwrap(), s);
    }

    #[test]
    fn signature_hex_roundtrip() {
        let bytes = [0x11; 64];
        let sig = SignatureBytes(bytes);
        assert_eq!(SignatureBytes::from_hex(&sig.to_hex()).unwrap(), sig);
    }

    #[test]
    fn pubnonce_hex_roundtrip_and_split() {
        let mut bytes = [0u8; 66];
        bytes[0] = 0x02;
        bytes[33] = 0x03;
        let pn = PublicNonceBytes(bytes);
        let recovered = PublicNonceBytes::from_hex(&pn.to_hex()).unwrap();
        assert_eq!(pn, recovered);
        assert_eq!(pn.r1()[0], 0x02);
        assert_eq!(pn.r2()[0], 0x03);
    }

    #[test]
    fn bad_hex_length_rejected() {
        assert!(PublicKeyBytes::from_hex("abcd").is_err());
    }

    #[test]
    fn sort_is_byte_wise() {
        let mut keys = vec![
            PublicKeyBytes([0x03; 33]),
            PublicKeyBytes([0x02; 33]),
            PublicKeyBytes([0x02; 33]),
        ];
        keys[2].0[32] = 0x01;
        sort_pubkeys(&mut keys);
        assert!(keys[0] <= keys[1]);
        assert!(keys[1] <= keys[2]);
    }
}
