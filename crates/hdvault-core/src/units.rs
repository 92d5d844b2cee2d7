//! Exact conversion between wei and decimal ether strings.

use crate::constants::{ETHER_DECIMALS, WEI_PER_ETHER};
use crate::error::UnitsError;

/// Render `wei` as ether with no trailing zeros, e.g. `1.5`, `0`, `0.000000000000000001`.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:0width$}", width = ETHER_DECIMALS);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Parse a decimal ether amount into wei. At most 18 fractional digits.
pub fn parse_ether(s: &str) -> Result<u128, UnitsError> {
    let s = s.trim();
    let invalid = || UnitsError::InvalidAmount(s.to_string());
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(UnitsError::TooManyDecimals {
            max: ETHER_DECIMALS,
        });
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| UnitsError::Overflow)?
    };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = ETHER_DECIMALS);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(frac))
        .ok_or(UnitsError::Overflow)
}
