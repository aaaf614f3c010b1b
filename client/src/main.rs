use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueHint};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trustswap_client::config::{ClientConfig, DEFAULT_CONFIG_PATH};
use trustswap_client::util::{load_keypair, load_ledger, save_json_file, save_ledger};
use trustswap_client::SwapClient;
use trustswap_core::interface::{load_json, read_keypair_file, write_keypair_file, EscrowMetadata};
use trustswap_core::{Address, Keypair, Ledger};

const DEFAULT_ESCROW_METADATA_PATH: &str = "./escrow_metadata.json";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(&cli.config)?.with_overrides(cli.ledger, cli.keypair);

    match cli.command {
        Commands::Init { force } => {
            if config.ledger_path.exists() && !force {
                anyhow::bail!(
                    "Ledger file {:?} already exists. Pass --force to replace it",
                    config.ledger_path
                );
            }
            let ledger = Ledger::new();
            save_ledger(&config.ledger_path, &ledger)?;
            info!(path = ?config.ledger_path, blockhash = %ledger.latest_blockhash(), "Ledger initialized");
        }
        Commands::Keygen { outfile, force } => {
            let path = outfile.unwrap_or_else(|| config.keypair_path.clone());
            if path.exists() && !force {
                anyhow::bail!(
                    "Keypair file {:?} already exists. Pass --force to replace it",
                    path
                );
            }
            let keypair = Keypair::new();
            write_keypair_file(&path, &keypair)?;
            println!("{}", keypair.address());
        }
        Commands::Airdrop { lamports, to } => {
            let mut ledger = load_ledger(&config.ledger_path)?;
            let to = match to {
                Some(to) => to,
                None => load_keypair(&config.keypair_path)?.address(),
            };
            let balance = ledger.airdrop(&to, lamports);
            save_ledger(&config.ledger_path, &ledger)?;
            println!("{} lamports at {}", balance, to);
        }
        Commands::CreateMint { decimals, mint_keypair } => {
            let mint = match mint_keypair {
                Some(path) => read_keypair_file(path)?,
                None => Keypair::new(),
            };
            let mut client = open(&config)?;
            let mint = client.create_mint(&mint, decimals)?;
            commit(&config, client)?;
            println!("{}", mint);
        }
        Commands::MintTo { mint, amount, to } => {
            let mut client = open(&config)?;
            let to = to.unwrap_or_else(|| client.payer());
            client.mint_to(&mint, &to, amount)?;
            let balance = client.token_balance(&to, &mint)?;
            commit(&config, client)?;
            println!("{} units of {} at {}", balance, mint, to);
        }
        Commands::Balance { wallet, mint } => {
            let ledger = load_ledger(&config.ledger_path)?;
            let wallet = match wallet {
                Some(wallet) => wallet,
                None => load_keypair(&config.keypair_path)?.address(),
            };
            let client = SwapClient::new(ledger, Keypair::new());
            match mint {
                Some(mint) => println!("{}", client.token_balance(&wallet, &mint)?),
                None => println!("{}", client.lamports(&wallet)),
            }
        }
        Commands::Make {
            mint_offered,
            mint_requested,
            seed,
            offer,
            request,
            outfile,
        } => {
            let mut client = open(&config)?;
            let metadata = client.make(&mint_offered, &mint_requested, seed, offer, request)?;
            commit(&config, client)?;

            // For reuse later during `Take` or `Refund`
            save_json_file(&outfile, &metadata)?;
            info!(escrow = %metadata.escrow, vault = %metadata.vault, "Escrow made successfully");
        }
        Commands::Take { target } => {
            let escrow = target.resolve()?;
            let mut client = open(&config)?;
            client.take(&escrow)?;
            commit(&config, client)?;
            info!(%escrow, "Escrow taken successfully");
        }
        Commands::Refund { target } => {
            let escrow = target.resolve()?;
            let mut client = open(&config)?;
            client.refund(&escrow)?;
            commit(&config, client)?;
            info!(%escrow, "Escrow refunded successfully");
        }
        Commands::ShowEscrow { target } => {
            let escrow = target.resolve()?;
            let ledger = load_ledger(&config.ledger_path)?;
            let client = SwapClient::new(ledger, Keypair::new());
            let record = client.escrow(&escrow)?;
            println!("{:#?}", record);
        }
        Commands::CounterInit { counter_keypair } => {
            let counter = match counter_keypair {
                Some(path) => read_keypair_file(path)?,
                None => Keypair::new(),
            };
            let mut client = open(&config)?;
            client.counter_init(&counter)?;
            commit(&config, client)?;
            println!("{}", counter.address());
        }
        Commands::Increment { counter } => {
            let mut client = open(&config)?;
            let count = client.increment(&counter)?;
            commit(&config, client)?;
            println!("{}", count);
        }
        Commands::Decrement { counter } => {
            let mut client = open(&config)?;
            let count = client.decrement(&counter)?;
            commit(&config, client)?;
            println!("{}", count);
        }
        Commands::Deposit { lamports } => {
            let mut client = open(&config)?;
            let balance = client.deposit(lamports)?;
            commit(&config, client)?;
            println!("{} lamports in vault", balance);
        }
        Commands::Withdraw => {
            let mut client = open(&config)?;
            let withdrawn = client.withdraw()?;
            commit(&config, client)?;
            println!("{} lamports withdrawn", withdrawn);
        }
        Commands::ShowVault { owner } => {
            let ledger = load_ledger(&config.ledger_path)?;
            let owner = match owner {
                Some(owner) => owner,
                None => load_keypair(&config.keypair_path)?.address(),
            };
            let client = SwapClient::new(ledger, Keypair::new());
            println!("{}", client.vault_balance(&owner)?);
        }
        Commands::ShowCounter { counter } => {
            let ledger = load_ledger(&config.ledger_path)?;
            let client = SwapClient::new(ledger, Keypair::new());
            let record = client.counter(&counter)?;
            println!("{:#?}", record);
        }
    }

    Ok(())
}

/// Loads the persisted ledger and the configured signer.
fn open(config: &ClientConfig) -> anyhow::Result<SwapClient> {
    let ledger = load_ledger(&config.ledger_path)?;
    let payer = load_keypair(&config.keypair_path)?;
    Ok(SwapClient::new(ledger, payer))
}

/// Persists the ledger after a committed operation.
fn commit(config: &ClientConfig, client: SwapClient) -> anyhow::Result<()> {
    save_ledger(&config.ledger_path, &client.into_ledger())
        .with_context(|| format!("saving ledger to {:?}", config.ledger_path))
}

#[derive(Parser)]
#[command(name = "trustswap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional config file with `ledger_path` and `keypair_path`.
    #[arg(long, global = true,
        value_parser,
        default_value = DEFAULT_CONFIG_PATH,
        value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Overrides the ledger snapshot path from the config.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    ledger: Option<PathBuf>,

    /// Overrides the signer keypair path from the config.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Identifies an escrow directly or through the metadata written by `make`.
#[derive(clap::Args)]
struct EscrowTarget {
    #[arg(short, long)]
    escrow: Option<Address>,

    #[arg(short, long,
        value_parser,
        default_value = DEFAULT_ESCROW_METADATA_PATH,
        value_hint = ValueHint::FilePath)]
    metadata: PathBuf,
}

impl EscrowTarget {
    fn resolve(self) -> anyhow::Result<Address> {
        if let Some(escrow) = self.escrow {
            return Ok(escrow);
        }
        let metadata: EscrowMetadata = load_json(&self.metadata)?;
        Ok(metadata.escrow)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Creates an empty ledger snapshot.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Generates a signer keypair.
    Keygen {
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        outfile: Option<PathBuf>,

        #[arg(long)]
        force: bool,
    },
    /// Credits lamports out of thin air.
    Airdrop {
        lamports: u64,

        #[arg(short, long)]
        to: Option<Address>,
    },
    /// Creates a mint with the signer as mint authority.
    CreateMint {
        #[arg(short, long, default_value_t = 6)]
        decimals: u8,

        #[arg(long, value_hint = ValueHint::FilePath)]
        mint_keypair: Option<PathBuf>,
    },
    MintTo {
        #[arg(short, long)]
        mint: Address,

        amount: u64,

        #[arg(short, long)]
        to: Option<Address>,
    },
    /// Prints lamports, or token units when `--mint` is given.
    Balance {
        #[arg(short, long)]
        wallet: Option<Address>,

        #[arg(short, long)]
        mint: Option<Address>,
    },
    /// Offers `offer` units of one mint for `request` units of another.
    Make {
        #[arg(long)]
        mint_offered: Address,

        #[arg(long)]
        mint_requested: Address,

        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        #[arg(long)]
        offer: u64,

        #[arg(long)]
        request: u64,

        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_METADATA_PATH,
            value_hint = ValueHint::FilePath)]
        outfile: PathBuf,
    },
    Take {
        #[command(flatten)]
        target: EscrowTarget,
    },
    Refund {
        #[command(flatten)]
        target: EscrowTarget,
    },
    ShowEscrow {
        #[command(flatten)]
        target: EscrowTarget,
    },
    /// Creates a counter owned by the signer.
    CounterInit {
        #[arg(long, value_hint = ValueHint::FilePath)]
        counter_keypair: Option<PathBuf>,
    },
    Increment {
        counter: Address,
    },
    Decrement {
        counter: Address,
    },
    ShowCounter {
        counter: Address,
    },
    /// Parks lamports in the signer's vault.
    Deposit {
        lamports: u64,
    },
    /// Empties the signer's vault back into the signer.
    Withdraw,
    /// Prints the lamports held in a vault.
    ShowVault {
        #[arg(short, long)]
        owner: Option<Address>,
    },
}
