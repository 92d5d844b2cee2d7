//! Recursive Length Prefix encoding, the subset needed for legacy transactions.
//!
//! ```text
//! single byte < 0x80      -> the byte itself
//! string, len <= 55       -> 0x80 + len, bytes
//! string, len > 55        -> 0xb7 + len(len), len (big-endian), bytes
//! list,   payload <= 55   -> 0xc0 + len, payload
//! list,   payload > 55    -> 0xf7 + len(len), len (big-endian), payload
//! ```
//!
//! Integers are encoded as their minimal big-endian byte string; zero is
//! the empty string.

/// Incremental builder for an RLP list.
#[derive(Debug, Default, Clone)]
pub struct RlpList {
    payload: Vec<u8>,
}

impl RlpList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte string.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.payload.extend_from_slice(&encode_bytes(data));
        self
    }

    /// Append an unsigned integer.
    pub fn uint(&mut self, value: u128) -> &mut Self {
        self.bytes(&minimal_be(value))
    }

    /// Append an already-encoded item.
    pub fn raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.payload.extend_from_slice(encoded);
        self
    }

    /// Wrap the accumulated payload in a list header.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = header(0xc0, self.payload.len());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Encode a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return vec![data[0]];
    }
    let mut out = header(0x80, data.len());
    out.extend_from_slice(data);
    out
}

/// Encode an unsigned integer.
pub fn encode_uint(value: u128) -> Vec<u8> {
    encode_bytes(&minimal_be(value))
}

fn header(offset: u8, len: usize) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let len_bytes = minimal_be(len as u128);
        let mut out = Vec::with_capacity(1 + len_bytes.len());
        out.push(offset + 55 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out
    }
}

fn minimal_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}
