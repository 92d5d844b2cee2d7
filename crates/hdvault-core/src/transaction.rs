//! Legacy Ethereum transactions with EIP-155 replay protection.
//!
//! # Signing hash
//!
//! ```text
//! keccak256(rlp([nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0]))
//! ```
//!
//! # Signed encoding
//!
//! ```text
//! rlp([nonce, gas_price, gas_limit, to, value, data, v, r, s])
//! v = recovery_id + 35 + 2 * chain_id
//! ```
//!
//! A contract creation has no recipient and encodes `to` as the empty string.

use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::crypto::{self, Signature};
use crate::error::TransactionError;
use crate::rlp::RlpList;
use crate::types::Hash256;

/// Base added to `2 * chain_id` to form the EIP-155 `v` value.
pub const EIP155_V_OFFSET: u64 = 35;

/// An unsigned legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegacyTransaction {
    pub nonce: u64,
    /// Price per gas unit in wei.
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Recipient. `None` creates a contract.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: u128,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn fields(&self) -> RlpList {
        let mut list = RlpList::new();
        list.uint(self.nonce as u128)
            .uint(self.gas_price)
            .uint(self.gas_limit as u128);
        match &self.to {
            Some(to) => list.bytes(to.as_bytes()),
            None => list.bytes(&[]),
        };
        list.uint(self.value).bytes(&self.data);
        list
    }

    /// The RLP payload hashed for signing under `chain_id`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        self.fields()
            .uint(chain_id as u128)
            .uint(0)
            .uint(0)
            .finish()
    }

    /// The 32-byte digest a signer commits to.
    pub fn signing_hash(&self, chain_id: u64) -> Hash256 {
        crypto::keccak256(&self.signing_payload(chain_id))
    }

    /// Sign with `key` for `chain_id`.
    pub fn sign(
        &self,
        key: &SigningKey,
        chain_id: u64,
    ) -> Result<SignedTransaction, TransactionError> {
        let hash = self.signing_hash(chain_id);
        let sig = crypto::sign_hash(key, hash.as_bytes())?;
        SignedTransaction::from_signature(self.clone(), chain_id, &sig)
    }
}

/// A transaction together with its EIP-155 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: LegacyTransaction,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl SignedTransaction {
    /// Attach a recoverable signature produced over `tx.signing_hash(chain_id)`.
    pub fn from_signature(
        tx: LegacyTransaction,
        chain_id: u64,
        signature: &Signature,
    ) -> Result<Self, TransactionError> {
        let v = chain_id
            .checked_mul(2)
            .and_then(|n| n.checked_add(EIP155_V_OFFSET + signature.v() as u64))
            .ok_or(TransactionError::ChainIdOverflow(chain_id))?;
        Ok(Self {
            tx,
            v,
            r: signature.r(),
            s: signature.s(),
        })
    }

    /// Chain id implied by `v`, or `None` for a pre-EIP-155 signature.
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= EIP155_V_OFFSET {
            Some((self.v - EIP155_V_OFFSET) / 2)
        } else {
            None
        }
    }

    /// The 65-byte `r || s || recovery_id` signature for `chain_id`.
    pub fn signature(&self, chain_id: u64) -> Result<Signature, TransactionError> {
        let invalid = TransactionError::InvalidV { v: self.v, chain_id };
        let base = chain_id
            .checked_mul(2)
            .and_then(|n| n.checked_add(EIP155_V_OFFSET))
            .ok_or(TransactionError::ChainIdOverflow(chain_id))?;
        let recid = self.v.checked_sub(base).ok_or(invalid.clone())?;
        if recid > 1 {
            return Err(invalid);
        }

        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = recid as u8;
        Signature::from_bytes(bytes).map_err(TransactionError::from)
    }

    /// Signed RLP encoding, ready for `eth_sendRawTransaction`.
    pub fn raw(&self) -> Vec<u8> {
        self.tx
            .fields()
            .uint(self.v as u128)
            .bytes(strip_zeros(&self.r))
            .bytes(strip_zeros(&self.s))
            .finish()
    }

    /// Transaction hash: keccak256 of the signed encoding.
    pub fn hash(&self) -> Hash256 {
        crypto::keccak256(&self.raw())
    }

    /// Recover the sending address.
    pub fn sender(&self, chain_id: u64) -> Result<Address, TransactionError> {
        let sig = self.signature(chain_id)?;
        let hash = self.tx.signing_hash(chain_id);
        crypto::recover_address(hash.as_bytes(), &sig).map_err(TransactionError::from)
    }
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WEI_PER_ETHER;

    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some(Address::from_bytes([0x35; 20])),
            value: WEI_PER_ETHER,
            data: Vec::new(),
        }
    }

    fn eip155_key() -> SigningKey {
        crypto::signing_key_from_bytes(&[0x46; 32]).unwrap()
    }

    #[test]
    fn signing_payload_matches_eip155_example() {
        let tx = eip155_example();
        assert_eq!(
            hex::encode(tx.signing_payload(1)),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash(1).as_bytes()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn signed_raw_matches_eip155_example() {
        let signed = eip155_example().sign(&eip155_key(), 1).unwrap();
        assert_eq!(signed.v, 37);
        assert_eq!(
            hex::encode(signed.raw()),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn v_encodes_chain_id() {
        let key = eip155_key();
        for chain_id in [1u64, 5, 137, 11_155_111] {
            let signed = eip155_example().sign(&key, chain_id).unwrap();
            let base = 35 + 2 * chain_id;
            assert!(signed.v == base || signed.v == base + 1);
            assert_eq!(signed.chain_id(), Some(chain_id));
        }
    }

    #[test]
    fn sender_recovers_signer() {
        let key = eip155_key();
        let expected = Address::from_public_key(key.verifying_key());
        let signed = eip155_example().sign(&key, 1).unwrap();
        assert_eq!(signed.sender(1).unwrap(), expected);
    }

    #[test]
    fn sender_with_wrong_chain_rejected() {
        let signed = eip155_example().sign(&eip155_key(), 1).unwrap();
        assert!(matches!(
            signed.sender(2),
            Err(TransactionError::InvalidV { .. })
        ));
    }

    #[test]
    fn chain_id_overflow_rejected() {
        let err = eip155_example().sign(&eip155_key(), u64::MAX).unwrap_err();
        assert_eq!(err, TransactionError::ChainIdOverflow(u64::MAX));
    }

    #[test]
    fn contract_creation_encodes_empty_recipient() {
        let tx = LegacyTransaction {
            to: None,
            data: vec![0x60, 0x80],
            ..eip155_example()
        };
        let with_to = eip155_example().signing_payload(1);
        let without_to = tx.signing_payload(1);
        // The 21-byte recipient item shrinks to one byte; data grows by two.
        assert_eq!(with_to.len() - 20 + 2, without_to.len());
    }

    #[test]
    fn hash_changes_with_signature() {
        let key = eip155_key();
        let a = eip155_example().sign(&key, 1).unwrap();
        let b = eip155_example().sign(&key, 3).unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn serde_roundtrip() {
        let tx = LegacyTransaction {
            data: vec![0xde, 0xad],
            ..eip155_example()
        };
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"0xdead\""));
        let back: LegacyTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
