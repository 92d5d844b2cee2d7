//! Wallet-wide constants. All monetary values in wei (1 ether = 10^18 wei).

/// Wei per ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Decimal places between wei and ether.
pub const ETHER_DECIMALS: usize = 18;

/// Offset added to a child index to mark it hardened (BIP-32).
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Number of consecutive unused addresses that ends a discovery branch (BIP-44).
pub const GAP_LIMIT: usize = 10;

/// Root of the Ethereum BIP-44 tree. Relative paths are appended to it.
pub const DEFAULT_ROOT_PATH: &str = "m/44'/60'/0'";

/// First account of the default Ethereum branch.
pub const DEFAULT_BASE_PATH: &str = "m/44'/60'/0'/0/0";

/// Base path used by legacy Ledger firmware (`m/44'/60'/0'/N`).
pub const LEGACY_LEDGER_BASE_PATH: &str = "m/44'/60'/0'/0";

/// Minimum BIP-32 seed length in bytes.
pub const MIN_SEED_LEN: usize = 16;

/// Maximum BIP-32 seed length in bytes.
pub const MAX_SEED_LEN: usize = 64;

/// Length of a BIP-39 derived seed in bytes.
pub const BIP39_SEED_LEN: usize = 64;

/// Length of an Ethereum address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a recoverable ECDSA signature (`r || s || v`).
pub const SIGNATURE_LEN: usize = 65;

/// Network identifier written into wallet files.
pub const NETWORK_ETHEREUM: &str = "ethereum";

/// Default JSON-RPC port of an Ethereum execution client.
pub const DEFAULT_RPC_PORT: u16 = 8545;
