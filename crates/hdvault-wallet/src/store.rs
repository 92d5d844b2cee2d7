//! On-disk wallet envelope.
//!
//! # File format
//! ```text
//! marker (1 byte) || payload_len (8 bytes LE) || payload (payload_len bytes)
//! ```
//!
//! | marker | payload                                      |
//! |--------|----------------------------------------------|
//! | `0`    | base64(json)                                 |
//! | `32`   | base64(iv (16 bytes) \|\| AES-256-CFB(json)) |
//!
//! Base64 is the standard alphabet with padding. Every save writes a new
//! file next to the old one and renames it into place.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::encryption::{self, KeySize, PasswordCheck};
use crate::error::WalletError;

/// Marker byte plus the 8-byte length.
pub const HEADER_LEN: usize = 9;

/// The decoded file layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub key_size: KeySize,
    /// Base64 text, still encoded.
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(self.key_size.marker());
        out.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a file image. The payload must be exactly the declared length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() < HEADER_LEN {
            return Err(WalletError::Decode(format!(
                "file too short: {} < {HEADER_LEN}",
                bytes.len()
            )));
        }
        let key_size = KeySize::from_marker(bytes[0])?;
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[1..HEADER_LEN]);
        let declared = u64::from_le_bytes(len_bytes);

        let payload = &bytes[HEADER_LEN..];
        if payload.len() as u64 != declared {
            return Err(WalletError::Decode(format!(
                "payload length {} does not match header {declared}",
                payload.len()
            )));
        }
        Ok(Self {
            key_size,
            payload: payload.to_vec(),
        })
    }
}

/// Build the envelope for `data`.
///
/// With a password the payload is encrypted and the returned check block
/// replaces the session's. If the session already has a check block, the
/// password must match it; a save without a password is then refused too.
pub fn seal(
    data: &[u8],
    password: Option<&[u8]>,
    check: Option<&PasswordCheck>,
) -> Result<(Envelope, Option<PasswordCheck>), WalletError> {
    match password {
        Some(password) => {
            let key = encryption::password_key(password);
            if let Some(check) = check {
                if !check.verify(&key) {
                    warn!("password does not match this wallet session");
                    return Err(WalletError::InvalidPassword);
                }
            }
            let new_check = PasswordCheck::create(&key)?;
            let ciphertext = encryption::encrypt(&key, data)?;
            Ok((
                Envelope {
                    key_size: KeySize::Aes256,
                    payload: STANDARD.encode(ciphertext).into_bytes(),
                },
                Some(new_check),
            ))
        }
        None => {
            if check.is_some() {
                warn!("refusing to save an encrypted wallet without its password");
                return Err(WalletError::InvalidPassword);
            }
            Ok((
                Envelope {
                    key_size: KeySize::None,
                    payload: STANDARD.encode(data).into_bytes(),
                },
                None,
            ))
        }
    }
}

/// Recover the serialized wallet from an envelope.
///
/// For an encrypted envelope a fresh check block for `password` is returned.
/// A wrong password is not detected here.
pub fn open(
    envelope: &Envelope,
    password: Option<&[u8]>,
) -> Result<(Vec<u8>, Option<PasswordCheck>), WalletError> {
    let decoded = STANDARD
        .decode(&envelope.payload)
        .map_err(|e| WalletError::Decode(format!("base64: {e}")))?;
    match envelope.key_size {
        KeySize::None => Ok((decoded, None)),
        KeySize::Aes256 => {
            let password = password.ok_or(WalletError::InvalidPassword)?;
            let key = encryption::password_key(password);
            let data = encryption::decrypt(&key, &decoded)?;
            Ok((data, Some(PasswordCheck::create(&key)?)))
        }
    }
}

/// Seal `data` and write it to `path`, replacing any previous file.
pub fn write_wallet_data(
    path: &Path,
    data: &[u8],
    password: Option<&[u8]>,
    check: Option<&PasswordCheck>,
) -> Result<Option<PasswordCheck>, WalletError> {
    let (envelope, new_check) = seal(data, password, check)?;
    let bytes = envelope.to_bytes();

    // Write a sibling temp file, then rename it over `path`. A crash leaves
    // either the old file or the new one.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WalletError::Io(e.to_string()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| WalletError::Io(e.to_string()))?;
    }
    tmp.write_all(&bytes).map_err(|e| WalletError::Io(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| WalletError::Io(e.to_string()))?;
    tmp.persist(path).map_err(|e| WalletError::Io(e.error.to_string()))?;

    info!(
        path = %path.display(),
        encrypted = envelope.key_size == KeySize::Aes256,
        bytes = bytes.len(),
        "wallet written"
    );
    Ok(new_check)
}

/// Read and open the envelope at `path`.
pub fn read_wallet_data(
    path: &Path,
    password: Option<&[u8]>,
) -> Result<(Vec<u8>, Option<PasswordCheck>), WalletError> {
    let bytes = std::fs::read(path).map_err(|e| WalletError::Io(e.to_string()))?;
    let envelope = Envelope::from_bytes(&bytes)?;
    let opened = open(&envelope, password)?;
    info!(
        path = %path.display(),
        encrypted = envelope.key_size == KeySize::Aes256,
        "wallet read"
    );
    Ok(opened)
}
