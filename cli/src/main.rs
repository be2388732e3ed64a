//! chaingate CLI — drive the chain adaptors against the configured nodes.
//!
//! # Commands
//! ```
//! chaingate --config config.yml chains
//! chaingate probe   --url <url>
//! chaingate block   --chain <name> (--number <n> | --hash <hash>)
//! chaingate header  --chain <name> (--number <n> | --hash <hash> | --tag <tag>)
//! chaingate range   --chain <name> --start <n> --end <n>
//! chaingate account --chain <name> --address <addr> [--contract <addr>]
//! chaingate fee     --chain <name>
//! chaingate send    --chain <name> --raw-tx <hex>
//! chaingate tx      --chain <name> --hash <hash>
//! ```
//!
//! Every command except `probe` brings up the chains listed in the config
//! and prints the adaptor's response record as pretty JSON.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use chaingate_core::account::*;
use chaingate_core::{is_endpoint_available, ChainDispatcher, GatewayConfig, LogConfig};
use chaingate_ethereum::{adaptor::canonical_header, BlockNumberOrTag, EthereumAdaptor};

mod tracing_setup;

/// Height selector the adaptors map to the `latest` tag.
const LATEST_HEIGHT: i64 = -2;

#[derive(Parser)]
#[command(
    name = "chaingate",
    about = "Multi-chain gateway — query configured nodes through the chain adaptors",
    version
)]
struct Cli {
    /// Gateway configuration file (YAML)
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the chains brought up from the config
    Chains,

    /// Check that a TCP connection to an endpoint can be opened
    Probe {
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
    },

    /// Fetch a block with its transactions
    Block {
        #[arg(long)]
        chain: String,
        /// Block number, or -1 pending, -2 latest, -3 finalized, -4 safe; omitted reads latest
        #[arg(long, conflicts_with = "hash", allow_negative_numbers = true)]
        number: Option<i64>,
        #[arg(long)]
        hash: Option<String>,
    },

    /// Fetch a block header
    Header {
        #[arg(long)]
        chain: String,
        /// Block number, or -1 pending, -2 latest, -3 finalized, -4 safe; omitted reads latest
        #[arg(long, conflicts_with_all = ["hash", "tag"], allow_negative_numbers = true)]
        number: Option<i64>,
        #[arg(long, conflicts_with = "tag")]
        hash: Option<String>,
        /// latest | safe | finalized | earliest | pending
        #[arg(long)]
        tag: Option<String>,
    },

    /// Fetch the headers of an inclusive height range
    Range {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },

    /// Nonce and balance of an account, or its token balance
    Account {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        address: String,
        /// ERC-20 contract to read the balance from
        #[arg(long)]
        contract: Option<String>,
    },

    /// Suggested fee tiers
    Fee {
        #[arg(long)]
        chain: String,
    },

    /// Broadcast a signed transaction
    Send {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        raw_tx: String,
    },

    /// Look up a transaction by hash
    Tx {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        hash: String,
    },
}

/// Connected chains: the routing registry plus typed handles for the
/// EVM-only queries the adaptor contract does not cover.
struct Gateway {
    dispatcher: ChainDispatcher,
    evm: HashMap<String, Arc<EthereumAdaptor>>,
}

impl Gateway {
    async fn connect(config: &GatewayConfig) -> Result<Self> {
        let mut dispatcher = ChainDispatcher::new();
        let mut evm = HashMap::new();
        for chain in &config.chains {
            let node = config
                .node(chain)
                .with_context(|| format!("no wallet_node entry for '{chain}'"))?;
            let name = chain.to_ascii_lowercase();
            let adaptor = EthereumAdaptor::connect(name.clone(), &config.network, node)
                .await
                .with_context(|| format!("failed to bring up chain '{chain}'"))?;
            let adaptor = Arc::new(adaptor);
            dispatcher.register(adaptor.clone());
            evm.insert(name, adaptor);
        }
        tracing::info!(chains = ?dispatcher.supported_chains(), "gateway ready");
        Ok(Self { dispatcher, evm })
    }

    fn evm(&self, chain: &str) -> Result<&EthereumAdaptor> {
        self.evm
            .get(&chain.to_ascii_lowercase())
            .map(Arc::as_ref)
            .with_context(|| format!("unsupported chain: {chain}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { url, timeout_ms } => {
            tracing_setup::init_tracing(&LogConfig::default());
            cmd_probe(&url, timeout_ms).await
        }
        command => {
            let config = GatewayConfig::from_file(&cli.config)
                .with_context(|| format!("failed to load {}", cli.config.display()))?;
            tracing_setup::init_tracing(&config.log);
            let gateway = Gateway::connect(&config).await?;
            run(&gateway, config.network, command).await
        }
    }
}

async fn run(gateway: &Gateway, network: String, command: Commands) -> Result<()> {
    match command {
        Commands::Probe { url, timeout_ms } => cmd_probe(&url, timeout_ms).await,

        Commands::Chains => print_json(&gateway.dispatcher.supported_chains()),

        Commands::Block { chain, number, hash } => {
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = match hash {
                Some(hash) => {
                    adaptor
                        .get_block_by_hash(BlockHashRequest {
                            chain,
                            hash,
                            view_tx: true,
                        })
                        .await?
                }
                None => {
                    adaptor
                        .get_block_by_number(BlockNumberRequest {
                            chain,
                            height: number.unwrap_or(LATEST_HEIGHT),
                            view_tx: true,
                        })
                        .await?
                }
            };
            print_json(&resp)
        }

        Commands::Header { chain, number, hash, tag } => {
            if let Some(tag) = tag {
                let tag: BlockNumberOrTag = tag.parse()?;
                let header = gateway.evm(&chain)?.client().header_by_number(tag).await?;
                return print_json(&canonical_header(&header));
            }
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = match hash {
                Some(hash) => {
                    adaptor
                        .get_block_header_by_hash(BlockHeaderHashRequest {
                            chain,
                            network,
                            hash,
                        })
                        .await?
                }
                None => {
                    adaptor
                        .get_block_header_by_number(BlockHeaderNumberRequest {
                            chain,
                            network,
                            height: number.unwrap_or(LATEST_HEIGHT),
                        })
                        .await?
                }
            };
            print_json(&resp)
        }

        Commands::Range { chain, start, end } => {
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = adaptor
                .get_block_by_range(BlockByRangeRequest {
                    chain,
                    network,
                    start,
                    end,
                })
                .await?;
            print_json(&resp)
        }

        Commands::Account { chain, address, contract } => {
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = adaptor
                .get_account(AccountRequest {
                    chain,
                    network,
                    address,
                    contract_address: contract.unwrap_or_default(),
                })
                .await?;
            print_json(&resp)
        }

        Commands::Fee { chain } => {
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = adaptor
                .get_fee(FeeRequest {
                    chain,
                    network,
                    ..Default::default()
                })
                .await?;
            print_json(&resp)
        }

        Commands::Send { chain, raw_tx } => {
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = adaptor
                .send_tx(SendTxRequest {
                    chain,
                    network,
                    raw_tx,
                })
                .await?;
            print_json(&resp)
        }

        Commands::Tx { chain, hash } => {
            let adaptor = gateway.dispatcher.adaptor(&chain)?;
            let resp = adaptor
                .get_tx_by_hash(TxHashRequest {
                    chain,
                    network,
                    hash,
                })
                .await?;
            print_json(&resp)
        }
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_probe(url: &str, timeout_ms: u64) -> Result<()> {
    let started = std::time::Instant::now();
    let available = is_endpoint_available(url, Duration::from_millis(timeout_ms)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    print_json(&serde_json::json!({
        "url": url,
        "available": available,
        "elapsed_ms": elapsed_ms,
    }))?;
    if !available {
        bail!("{url} is not reachable");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
