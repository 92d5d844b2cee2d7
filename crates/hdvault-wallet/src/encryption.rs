//! AES-256-CFB wallet payload encryption.
//!
//! The key is SHA-256 of the password. CFB carries no authentication tag,
//! so decrypting with the wrong key yields garbage instead of an error;
//! callers detect that by failing to parse the result.
//!
//! # Wire format
//! ```text
//! iv (16 bytes) || ciphertext (same length as plaintext)
//! ```

use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// AES block and IV length in bytes.
pub const IV_LEN: usize = 16;

/// Plaintext of the in-memory password check block.
const PASSWORD_CHECK_PLAINTEXT: &[u8] = b"hdvault-password-check-v1";

type CfbEncryptor = cfb_mode::Encryptor<Aes256>;
type CfbDecryptor = cfb_mode::Decryptor<Aes256>;

/// Envelope marker naming the key size of the payload cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeySize {
    /// Payload is plaintext.
    None = 0,
    /// Payload is AES-256-CFB ciphertext.
    Aes256 = 32,
}

impl KeySize {
    pub fn marker(self) -> u8 {
        self as u8
    }

    /// Parse an envelope marker byte.
    pub fn from_marker(marker: u8) -> Result<Self, WalletError> {
        match marker {
            0 => Ok(KeySize::None),
            32 => Ok(KeySize::Aes256),
            other => Err(WalletError::Decode(format!("unknown key size marker {other}"))),
        }
    }
}

/// Derive the 32-byte cipher key from a password.
pub fn password_key(password: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&Sha256::digest(password));
    key
}

/// Encrypt with a fresh random IV. Returns `iv || ciphertext`.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
    use rand::RngCore;
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    encrypt_with_iv(key, &iv, plaintext)
}

fn encrypt_with_iv(
    key: &[u8; 32],
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, WalletError> {
    let cipher = CfbEncryptor::new_from_slices(key, iv)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(IV_LEN + plaintext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(plaintext);
    cipher.encrypt(&mut out[IV_LEN..]);
    Ok(out)
}

/// Decrypt `iv || ciphertext` produced by [`encrypt`].
///
/// Only a too-short input is an error. A wrong key returns garbage.
pub fn decrypt(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, WalletError> {
    if data.len() < IV_LEN {
        return Err(WalletError::Decode(format!(
            "ciphertext too short: {} < {IV_LEN}",
            data.len()
        )));
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);
    let cipher = CfbDecryptor::new_from_slices(key, iv)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut out = ciphertext.to_vec();
    cipher.decrypt(&mut out);
    Ok(out)
}

/// A known plaintext encrypted under the session key.
///
/// Held in memory only, never written to the wallet file. It lets a later
/// save in the same session confirm the caller knows the password the
/// wallet was loaded or last saved with.
#[derive(Clone)]
pub struct PasswordCheck {
    block: Vec<u8>,
}

impl PasswordCheck {
    pub fn create(key: &[u8; 32]) -> Result<Self, WalletError> {
        Ok(Self {
            block: encrypt(key, PASSWORD_CHECK_PLAINTEXT)?,
        })
    }

    /// Whether `key` decrypts the block back to the known plaintext.
    pub fn verify(&self, key: &[u8; 32]) -> bool {
        decrypt(key, &self.block)
            .map(|plain| plain == PASSWORD_CHECK_PLAINTEXT)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for PasswordCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordCheck([REDACTED])")
    }
}
