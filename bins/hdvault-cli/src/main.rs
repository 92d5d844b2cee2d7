//! hdvault-cli: command-line front end for the hdvault HD wallet.
//!
//! Creates and restores wallets, manages tracked accounts, runs gap-limit
//! discovery against an Ethereum JSON-RPC node, and signs digests. Wallet
//! passwords are read from the terminal without echo.

mod config;
mod rpc;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use hdvault_core::address::Address;
use hdvault_core::path::DerivationPath;
use hdvault_core::traits::BlockRef;
use hdvault_wallet::mnemonic::{self, VALID_WORD_COUNTS};
use hdvault_wallet::{Account, Seed, Wallet, WalletError};
use tracing::info;

use crate::config::CliConfig;
use crate::rpc::RpcLedgerOracle;

/// hdvault command-line wallet.
#[derive(Parser)]
#[command(name = "hdvault-cli")]
#[command(version, about = "Hierarchical-deterministic Ethereum wallet")]
struct Cli {
    /// Wallet file (default: ~/.hdvault/wallet.dat, or $HDVAULT_WALLET).
    #[arg(short, long, global = true)]
    wallet: Option<PathBuf>,

    /// JSON-RPC endpoint (default: http://127.0.0.1:8545, or $HDVAULT_RPC_ENDPOINT).
    #[arg(long, global = true)]
    rpc_endpoint: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format: text or json.
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management subcommands.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Derive the account at a path, optionally tracking it.
    Derive(DeriveArgs),
    /// Stop tracking an account.
    Unpin(AddressArg),
    /// List tracked accounts.
    Accounts,
    /// Scan derivation branches for used accounts and track them.
    Discover(DiscoverArgs),
    /// Query the balance of a tracked account.
    Balance(BalanceArgs),
    /// Sign a 32-byte digest with a tracked account.
    SignHash(SignHashArgs),
    /// Sign a personal message (EIP-191) with a tracked account.
    SignText(SignTextArgs),
    /// Print the private key of a tracked account.
    ExportKey(AddressArg),
    /// List BIP-39 words starting with a prefix.
    Suggest(SuggestArgs),
}

#[derive(Subcommand)]
enum WalletAction {
    /// Create a new wallet from a fresh mnemonic.
    Create(WalletCreateArgs),
    /// Restore a wallet from a mnemonic or a hex seed.
    Restore(WalletRestoreArgs),
}

#[derive(Args)]
struct WalletCreateArgs {
    /// Mnemonic length in words (12, 15, 18, 21, or 24).
    #[arg(long, default_value_t = 12)]
    words: usize,

    /// Prompt for a BIP-39 passphrase.
    #[arg(long)]
    passphrase: bool,

    /// Store the wallet unencrypted.
    #[arg(long)]
    plain: bool,
}

#[derive(Args)]
struct WalletRestoreArgs {
    /// Mnemonic phrase. If neither this nor --seed is given, prompts securely.
    #[arg(long, conflicts_with = "seed")]
    mnemonic: Option<String>,

    /// Hex-encoded BIP-32 seed (16 to 64 bytes).
    #[arg(long)]
    seed: Option<String>,

    /// Prompt for a BIP-39 passphrase.
    #[arg(long)]
    passphrase: bool,

    /// Store the wallet unencrypted.
    #[arg(long)]
    plain: bool,
}

#[derive(Args)]
struct DeriveArgs {
    /// Absolute (m/44'/60'/0'/0/1) or relative (0/1) derivation path.
    path: String,

    /// Track the derived account.
    #[arg(long)]
    pin: bool,
}

#[derive(Args)]
struct AddressArg {
    /// Account address (0x-prefixed).
    address: String,
}

#[derive(Args)]
struct DiscoverArgs {
    /// Base path of a branch to scan. Repeatable.
    #[arg(long = "base")]
    bases: Vec<String>,
}

#[derive(Args)]
struct BalanceArgs {
    /// Account address (0x-prefixed).
    address: String,

    /// Block: latest, pending, or a block number.
    #[arg(long, default_value = "latest")]
    block: String,
}

#[derive(Args)]
struct SignHashArgs {
    /// Account address (0x-prefixed).
    address: String,

    /// 32-byte digest as hex, with or without 0x.
    digest: String,
}

#[derive(Args)]
struct SignTextArgs {
    /// Account address (0x-prefixed).
    address: String,

    /// Message text.
    text: String,
}

#[derive(Args)]
struct SuggestArgs {
    /// Word prefix. Empty lists the whole word list.
    #[arg(default_value = "")]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::from_env().with_overrides(
        cli.wallet,
        cli.rpc_endpoint,
        cli.log_level,
        cli.log_format,
    );
    init_logging(&config);

    match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Create(args) => wallet_create(&config, args),
            WalletAction::Restore(args) => wallet_restore(&config, args),
        },
        Commands::Derive(args) => derive(&config, args),
        Commands::Unpin(args) => unpin(&config, args),
        Commands::Accounts => accounts(&config),
        Commands::Discover(args) => discover(&config, args).await,
        Commands::Balance(args) => balance(&config, args).await,
        Commands::SignHash(args) => sign_hash(&config, args),
        Commands::SignText(args) => sign_text(&config, args),
        Commands::ExportKey(args) => export_key(&config, args),
        Commands::Suggest(args) => {
            for word in mnemonic::suggest_words(&args.prefix) {
                println!("{word}");
            }
            Ok(())
        }
    }
}

fn init_logging(config: &CliConfig) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// ------------------------------------------------------------------
// Wallet lifecycle
// ------------------------------------------------------------------

/// Create a wallet from a freshly generated mnemonic.
fn wallet_create(config: &CliConfig, args: WalletCreateArgs) -> Result<()> {
    let path = &config.wallet_path;
    ensure_absent(path)?;
    if !VALID_WORD_COUNTS.contains(&args.words) {
        bail!("--words must be one of {VALID_WORD_COUNTS:?}");
    }

    let passphrase = if args.passphrase {
        prompt_confirmed("BIP-39 passphrase")?
    } else {
        String::new()
    };
    let password = if args.plain {
        None
    } else {
        Some(prompt_confirmed("Wallet password")?)
    };

    let mut wallet = Wallet::generate(args.words, &passphrase).context("Failed to create wallet")?;
    let first = wallet
        .derive(&DerivationPath::default_base(), true)
        .context("Failed to derive first account")?;
    save_new(&mut wallet, path, password.as_deref())?;

    println!("\n=== WALLET CREATED ===");
    println!("\nMNEMONIC (BACK THIS UP, {} WORDS):", args.words);
    println!("  {}", wallet.mnemonic().unwrap_or_default());
    println!("\nWARNING: This mnemonic will NOT be shown again.");
    println!("Anyone with the mnemonic (and passphrase, if set) controls these accounts.");
    println!("\nFirst account: {} ({})", first.address, first.url);
    println!("Wallet saved to: {}", path.display());
    Ok(())
}

/// Restore a wallet from a mnemonic or a hex seed.
fn wallet_restore(config: &CliConfig, args: WalletRestoreArgs) -> Result<()> {
    let path = &config.wallet_path;
    ensure_absent(path)?;

    let mut wallet = if let Some(seed) = args.seed {
        let seed = Seed::from_hex(seed.trim()).context("Invalid hex seed")?;
        Wallet::from_seed(seed).context("Failed to restore wallet")?
    } else {
        let phrase = match args.mnemonic {
            Some(phrase) => phrase,
            None => prompt_password("Enter mnemonic")?,
        };
        let passphrase = if args.passphrase {
            prompt_password("BIP-39 passphrase")?
        } else {
            String::new()
        };
        Wallet::from_mnemonic(&phrase, &passphrase).context("Invalid mnemonic")?
    };

    let password = if args.plain {
        None
    } else {
        Some(prompt_confirmed("New wallet password")?)
    };

    let first = wallet
        .derive(&DerivationPath::default_base(), true)
        .context("Failed to derive first account")?;
    save_new(&mut wallet, path, password.as_deref())?;

    println!("\n=== WALLET RESTORED ===");
    println!("First account: {} ({})", first.address, first.url);
    println!("Run `hdvault-cli discover` to find other used accounts.");
    println!("Wallet saved to: {}", path.display());
    Ok(())
}

// ------------------------------------------------------------------
// Accounts
// ------------------------------------------------------------------

fn derive(config: &CliConfig, args: DeriveArgs) -> Result<()> {
    let path: DerivationPath = args
        .path
        .parse()
        .with_context(|| format!("Invalid derivation path {:?}", args.path))?;

    let mut session = Session::open(config)?;
    let account = session.wallet.derive(&path, args.pin)?;
    if args.pin {
        session.save()?;
    }
    println!("{}  {}", account.address, account.url);
    Ok(())
}

fn unpin(config: &CliConfig, args: AddressArg) -> Result<()> {
    let address = parse_address(&args.address)?;
    let mut session = Session::open(config)?;
    session.wallet.unpin(&address)?;
    session.save()?;
    println!("Unpinned {address}");
    Ok(())
}

fn accounts(config: &CliConfig) -> Result<()> {
    let session = Session::open(config)?;
    let accounts = session.wallet.accounts();
    if accounts.is_empty() {
        println!("No tracked accounts.");
    }
    for account in accounts {
        println!("{}  {}", account.address, account.url);
    }
    Ok(())
}

async fn discover(config: &CliConfig, args: DiscoverArgs) -> Result<()> {
    let bases = if args.bases.is_empty() {
        vec![
            DerivationPath::default_base(),
            DerivationPath::legacy_ledger_base(),
        ]
    } else {
        args.bases
            .iter()
            .map(|b| {
                b.parse::<DerivationPath>()
                    .with_context(|| format!("Invalid base path {b:?}"))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let oracle = RpcLedgerOracle::connect(&config.rpc_endpoint)
        .with_context(|| format!("Failed to connect to {}", config.rpc_endpoint))?;
    let mut session = Session::open(config)?;

    let result = session.wallet.discover(&bases, &oracle).await;
    // Accounts pinned before a failure are kept.
    session.save()?;
    let report = result.context("Discovery failed")?;

    println!("Scanned {} addresses.", report.scanned);
    if report.pinned.is_empty() {
        println!("No new accounts found.");
    }
    for account in &report.pinned {
        println!("  + {}  {}", account.address, account.url);
    }
    Ok(())
}

async fn balance(config: &CliConfig, args: BalanceArgs) -> Result<()> {
    let address = parse_address(&args.address)?;
    let block = parse_block(&args.block)?;

    let session = Session::open(config)?;
    let account = session.account(&address)?;
    let oracle = RpcLedgerOracle::connect(&config.rpc_endpoint)
        .with_context(|| format!("Failed to connect to {}", config.rpc_endpoint))?;

    let ether = session
        .wallet
        .account_balance_ether(&oracle, &account, block)
        .await
        .context("Balance query failed")?;
    println!("{ether} ETH");
    Ok(())
}

// ------------------------------------------------------------------
// Signing and export
// ------------------------------------------------------------------

fn sign_hash(config: &CliConfig, args: SignHashArgs) -> Result<()> {
    let address = parse_address(&args.address)?;
    let digest_hex = args.digest.trim();
    let digest = hex::decode(digest_hex.strip_prefix("0x").unwrap_or(digest_hex))
        .context("Digest is not valid hex")?;

    let session = Session::open(config)?;
    let sig = session.wallet.signer().sign_hash(&address, &digest)?;
    println!("0x{}", hex::encode(sig.as_bytes()));
    Ok(())
}

fn sign_text(config: &CliConfig, args: SignTextArgs) -> Result<()> {
    let address = parse_address(&args.address)?;
    let session = Session::open(config)?;
    let sig = session
        .wallet
        .signer()
        .sign_text(&address, args.text.as_bytes())?;
    println!("0x{}", hex::encode(sig.as_bytes()));
    Ok(())
}

fn export_key(config: &CliConfig, args: AddressArg) -> Result<()> {
    let address = parse_address(&args.address)?;
    let session = Session::open(config)?;
    let account = session.account(&address)?;

    let key = session.wallet.private_key_hex(&account)?;
    eprintln!("WARNING: anyone with this key controls {address}.");
    println!("{}", key.as_str());
    Ok(())
}

// ------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------

/// A loaded wallet plus the password it was opened with.
struct Session {
    wallet: Wallet,
    path: PathBuf,
    password: Option<String>,
}

impl Session {
    /// Load the configured wallet, prompting for a password only if the
    /// file is encrypted.
    fn open(config: &CliConfig) -> Result<Self> {
        let path = config.wallet_path.clone();
        if !path.exists() {
            bail!(
                "No wallet at {} (create one with `hdvault-cli wallet create`)",
                path.display()
            );
        }

        let (wallet, password) = match Wallet::load(&path, None) {
            Ok(wallet) => (wallet, None),
            Err(WalletError::InvalidPassword) => {
                let password = prompt_password("Wallet password")?;
                let wallet = Wallet::load(&path, Some(password.as_bytes()))
                    .context("Failed to load wallet (check password)")?;
                (wallet, Some(password))
            }
            Err(e) => return Err(e).context("Failed to load wallet"),
        };
        info!(path = %path.display(), "wallet opened");
        Ok(Self {
            wallet,
            path,
            password,
        })
    }

    fn save(&mut self) -> Result<()> {
        let password = self.password.as_deref().map(str::as_bytes);
        self.wallet
            .save(&self.path, password)
            .context("Failed to save wallet")
    }

    /// The tracked account for `address`.
    fn account(&self, address: &Address) -> Result<Account> {
        let url = self
            .wallet
            .tracker()
            .path_of(address)
            .ok_or(WalletError::UnknownAccount(*address))?;
        Ok(Account {
            address: *address,
            url,
        })
    }
}

fn save_new(wallet: &mut Wallet, path: &Path, password: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    wallet
        .save(path, password.map(str::as_bytes))
        .context("Failed to save wallet")
}

fn ensure_absent(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Wallet file already exists: {}", path.display());
    }
    Ok(())
}

fn parse_address(s: &str) -> Result<Address> {
    s.trim()
        .parse()
        .with_context(|| format!("Invalid address {s:?}"))
}

fn parse_block(s: &str) -> Result<BlockRef> {
    match s.trim().to_lowercase().as_str() {
        "latest" => Ok(BlockRef::Latest),
        "pending" => Ok(BlockRef::Pending),
        other => other
            .parse::<u64>()
            .map(BlockRef::Number)
            .with_context(|| format!("Invalid block {s:?} (latest, pending, or a number)")),
    }
}

/// Prompt for a secret without echo.
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read input")
}

/// Prompt twice and require both entries to match.
fn prompt_confirmed(prompt: &str) -> Result<String> {
    let first = prompt_password(prompt)?;
    let second = prompt_password(&format!("Confirm {}", prompt.to_lowercase()))?;
    if first != second {
        bail!("Entries do not match");
    }
    Ok(first)
}
