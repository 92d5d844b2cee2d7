//! secp256k1 signing and Keccak-256 hashing.
//!
//! Signatures are recoverable ECDSA over a caller-supplied 32-byte digest,
//! laid out as 65 bytes:
//!
//! ```text
//! [r: 32 bytes][s: 32 bytes][v: 1 byte, recovery id 0 or 1]
//! ```
//!
//! Nothing in this module hashes implicitly before signing. Callers that
//! want to sign arbitrary data hash it first with [`keccak256`] or
//! [`text_hash`].

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

use crate::address::Address;
use crate::constants::SIGNATURE_LEN;
use crate::error::CryptoError;
use crate::types::Hash256;

/// Length of a digest accepted by [`sign_hash`].
pub const DIGEST_LEN: usize = 32;

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    finish(hasher)
}

/// EIP-191 personal message hash:
/// `keccak256("\x19Ethereum Signed Message:\n" ++ len(message) ++ message)`.
pub fn text_hash(message: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    finish(hasher)
}

fn finish(hasher: Keccak256) -> Hash256 {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Hash256(out)
}

/// A 65-byte recoverable secp256k1 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Wrap raw signature bytes, validating the recovery byte.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Result<Self, CryptoError> {
        if bytes[64] > 1 {
            return Err(CryptoError::InvalidRecoveryId(bytes[64] as u64));
        }
        Ok(Self(bytes))
    }

    /// Parse a signature from a byte slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; SIGNATURE_LEN] =
            bytes.try_into().map_err(|_| CryptoError::InvalidSignature)?;
        Self::from_bytes(array)
    }

    /// The `r` scalar, big-endian.
    pub fn r(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[..32]);
        out
    }

    /// The `s` scalar, big-endian.
    pub fn s(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[32..64]);
        out
    }

    /// The recovery id, 0 or 1.
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let mut bytes = [0u8; SIGNATURE_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(serde::de::Error::custom)?;
        Self::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}

fn check_digest(digest: &[u8]) -> Result<(), CryptoError> {
    if digest.len() != DIGEST_LEN {
        return Err(CryptoError::InvalidDigestLength {
            expected: DIGEST_LEN,
            got: digest.len(),
        });
    }
    Ok(())
}

/// Sign a 32-byte digest. Any other length is rejected.
pub fn sign_hash(key: &SigningKey, digest: &[u8]) -> Result<Signature, CryptoError> {
    check_digest(digest)?;
    let (sig, recid) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let mut bytes = [0u8; SIGNATURE_LEN];
    bytes[..64].copy_from_slice(&sig.to_bytes());
    bytes[64] = recid.to_byte();
    Ok(Signature(bytes))
}

/// Recover the public key that produced `signature` over `digest`.
pub fn recover_public_key(
    digest: &[u8],
    signature: &Signature,
) -> Result<VerifyingKey, CryptoError> {
    check_digest(digest)?;
    let sig = EcdsaSignature::from_slice(&signature.0[..64])
        .map_err(|_| CryptoError::InvalidSignature)?;
    let recid = RecoveryId::from_byte(signature.v())
        .ok_or(CryptoError::InvalidRecoveryId(signature.v() as u64))?;
    VerifyingKey::recover_from_prehash(digest, &sig, recid).map_err(|_| CryptoError::RecoveryFailed)
}

/// Recover the signing address from a signature over `digest`.
pub fn recover_address(digest: &[u8], signature: &Signature) -> Result<Address, CryptoError> {
    recover_public_key(digest, signature).map(|key| Address::from_public_key(&key))
}

/// Parse a 32-byte secp256k1 secret key.
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, CryptoError> {
    SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Uncompressed SEC1 public key, 65 bytes with the `0x04` tag.
pub fn uncompressed_public_key(key: &VerifyingKey) -> Vec<u8> {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    key.to_encoded_point(false).as_bytes().to_vec()
}
