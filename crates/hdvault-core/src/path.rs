//! BIP-32 derivation paths.
//!
//! A path is an ordered list of 32-bit child indices; indices at or above
//! [`HARDENED_OFFSET`] are hardened. The canonical string form is
//! `m/44'/60'/0'/0/0`.
//!
//! Parsing follows the Ethereum wallet convention:
//! - `m/...` is absolute.
//! - A path without the `m` prefix is relative and gets appended to
//!   [`DerivationPath::default_root`] (`m/44'/60'/0'`).
//! - Components are decimal or `0x` hex, optionally followed by `'`.
//! - Whitespace around components and the hardened marker is ignored.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::HARDENED_OFFSET;
use crate::error::PathError;

/// Root of the Ethereum BIP-44 tree: `m/44'/60'/0'`.
const DEFAULT_ROOT: [u32; 3] = [HARDENED_OFFSET + 44, HARDENED_OFFSET + 60, HARDENED_OFFSET];

/// Whether a child index is hardened.
pub fn is_hardened(index: u32) -> bool {
    index >= HARDENED_OFFSET
}

/// An ordered sequence of BIP-32 child indices.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// Build a path from raw child indices.
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    /// `m/44'/60'/0'`, the prefix of every relative path.
    pub fn default_root() -> Self {
        Self(DEFAULT_ROOT.to_vec())
    }

    /// `m/44'/60'/0'/0/0`, the first account of the default branch.
    pub fn default_base() -> Self {
        Self(vec![DEFAULT_ROOT[0], DEFAULT_ROOT[1], DEFAULT_ROOT[2], 0, 0])
    }

    /// `m/44'/60'/0'/0`, where legacy Ledger firmware counts accounts.
    pub fn legacy_ledger_base() -> Self {
        Self(vec![DEFAULT_ROOT[0], DEFAULT_ROOT[1], DEFAULT_ROOT[2], 0])
    }

    /// The raw child indices.
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Number of derivation steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no steps (the master key itself).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last child index, if any.
    pub fn last_index(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// A new path with `index` appended.
    pub fn child(&self, index: u32) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Iterate the branch rooted at this path.
    ///
    /// The first item is the path itself; each following item increments the
    /// last index by one. Iteration stops rather than wrapping when the last
    /// index would leave its hardened or non-hardened range. An empty path
    /// yields nothing.
    pub fn branch(&self) -> BranchIter {
        BranchIter {
            next: if self.is_empty() { None } else { Some(self.clone()) },
        }
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for &index in &self.0 {
            if is_hardened(index) {
                write!(f, "/{}'", index - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components: Vec<&str> = s.split('/').collect();
        let mut indices = Vec::new();

        match components.first().map(|c| c.trim()) {
            None => return Err(PathError::Empty),
            Some("") => return Err(PathError::Ambiguous),
            Some("m") => {
                components.remove(0);
            }
            Some(_) => indices.extend_from_slice(&DEFAULT_ROOT),
        }
        if components.is_empty() {
            return Err(PathError::Empty);
        }

        for component in components {
            indices.push(parse_component(component)?);
        }
        Ok(Self(indices))
    }
}

/// Parse one path component (`44'`, `0x3c`, ` 0 ' `) into a child index.
fn parse_component(component: &str) -> Result<u32, PathError> {
    let mut body = component.trim();
    let mut offset = 0u32;
    if let Some(stripped) = body.strip_suffix('\'') {
        offset = HARDENED_OFFSET;
        body = stripped.trim();
    }

    let parsed = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => u128::from_str_radix(hex, 16),
        None => body.parse::<u128>(),
    }
    .map_err(|_| PathError::InvalidComponent(body.to_string()))?;

    let max = u32::MAX - offset;
    if parsed > u128::from(max) {
        return Err(PathError::OutOfRange {
            value: body.to_string(),
            max,
        });
    }
    // Range checked above.
    Ok(offset + parsed as u32)
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Iterator over successive paths of one branch. See [`DerivationPath::branch`].
#[derive(Clone, Debug)]
pub struct BranchIter {
    next: Option<DerivationPath>,
}

impl Iterator for BranchIter {
    type Item = DerivationPath;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.last_index().and_then(|last| {
            last.checked_add(1)
                .filter(|&n| is_hardened(n) == is_hardened(last))
                .map(|n| {
                    let mut indices = current.0.clone();
                    if let Some(slot) = indices.last_mut() {
                        *slot = n;
                    }
                    DerivationPath(indices)
                })
        });
        Some(current)
    }
}
