//! BIP-39 mnemonic generation, seed derivation, and word suggestion.

use bip39::{Language, Mnemonic};
use zeroize::Zeroize;

use crate::error::WalletError;
use crate::keys::Seed;

/// Word counts accepted by [`generate_mnemonic`].
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Collapse runs of whitespace and lowercase the phrase.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Generate a fresh English mnemonic of `word_count` words.
///
/// Entropy is `word_count * 32 / 3` bits (128 to 256) from the OS RNG.
pub fn generate_mnemonic(word_count: usize) -> Result<String, WalletError> {
    use rand::RngCore;

    if !VALID_WORD_COUNTS.contains(&word_count) {
        return Err(WalletError::InvalidInput(format!(
            "word count must be one of {VALID_WORD_COUNTS:?}, got {word_count}"
        )));
    }
    let mut entropy = vec![0u8; word_count * 4 / 3];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let result = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map(|m| m.to_string())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    result
}

/// Validate a mnemonic and derive its 64-byte BIP-39 seed.
///
/// Whitespace is normalized and case folded before parsing. An empty
/// passphrase is the BIP-39 default.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Seed, WalletError> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return Err(WalletError::InvalidMnemonic("empty mnemonic".into()));
    }
    let m = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let mut bytes = m.to_seed_normalized(passphrase);
    let seed = Seed::from_bytes(&bytes);
    bytes.zeroize();
    seed
}

/// English BIP-39 words starting with `prefix`. An empty prefix matches every word.
pub fn suggest_words(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.trim().to_lowercase();
    Language::English.words_by_prefix(&prefix).to_vec()
}
