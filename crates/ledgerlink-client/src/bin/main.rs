//! ledgerlink: public-id tooling and one-off ledger lookups
//!
//! ```bash
//! ledgerlink --config ledgerlink.json encode raffle 0 1 2
//! ledgerlink --config ledgerlink.json decode raffle 092726d9dd57
//! ledgerlink --config ledgerlink.json verify-ids
//! ledgerlink --config ledgerlink.json get raffle 092726d9dd57 06bd83343baf
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ledgerlink_client::OnChainQueryFacade;
use ledgerlink_core::{
    EntityClass, IdentifierCodec, InternalId, LedgerLinkConfig, TimestampedIdentifierCodec,
};
use ledgerlink_rpc::{JsonRpcLedger, ResilientLedger};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledgerlink")]
#[command(about = "Public identifiers for on-chain raffles and payment links")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "ledgerlink.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the public id of each internal id
    Encode {
        class: EntityClass,
        ids: Vec<InternalId>,
    },

    /// Resolve public ids back to internal ids
    Decode {
        class: EntityClass,
        ids: Vec<String>,
    },

    /// Check every configured class for truncated-hash collisions below its bound
    VerifyIds,

    /// Issue a timestamped id
    Stamp {
        id: InternalId,

        /// Unix milliseconds; defaults to now
        #[arg(long)]
        timestamp_ms: Option<u64>,
    },

    /// Parse a timestamped id, optionally checking it against an internal id
    ParseStamp {
        stamp: String,

        #[arg(long)]
        id: Option<InternalId>,
    },

    /// Fetch entities from the ledger by public id
    Get {
        class: EntityClass,
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ledgerlink=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = LedgerLinkConfig::load(&args.config)?;

    match args.command {
        Command::Encode { class, ids } => {
            let codec = codec_for(&config, class)?;
            for id in ids {
                println!("{}\t{}", id, codec.encode(id));
            }
        }
        Command::Decode { class, ids } => {
            let codec = codec_for(&config, class)?;
            for id in ids {
                match codec.decode(&id) {
                    Some(internal) => println!("{}\t{}", id, internal),
                    None => println!("{}\tnot found below {}", id, codec.search_bound()),
                }
            }
        }
        Command::VerifyIds => {
            for class_config in &config.classes {
                let codec = IdentifierCodec::new(
                    class_config.class,
                    class_config.salt.clone(),
                    class_config.search_bound,
                    class_config.id_length,
                )?;
                codec.verify_no_collisions()?;
                println!(
                    "[OK] {}: no collisions in {} ids of {} chars",
                    class_config.class, class_config.search_bound, class_config.id_length
                );
            }
        }
        Command::Stamp { id, timestamp_ms } => {
            let stamps = stamp_codec(&config)?;
            let stamp = match timestamp_ms {
                Some(ts) => stamps.encode(id, ts),
                None => stamps.encode_now(id),
            };
            println!("{}", stamp);
        }
        Command::ParseStamp { stamp, id } => {
            let stamps = stamp_codec(&config)?;
            let parts = stamps.decode(&stamp)?;
            println!("timestamp_ms\t{}", parts.timestamp_ms);
            println!("hash\t{}", parts.hash);
            if let Some(id) = id {
                println!("matches {}\t{}", id, stamps.matches(id, &parts));
            }
        }
        Command::Get { class, ids } => {
            let remote = JsonRpcLedger::connect(&config.rpc_url, &config.classes).await?;
            let ledger = Arc::new(ResilientLedger::new(remote, &config.resilience)?);
            let facade = OnChainQueryFacade::connect(&config, ledger).await?;

            for (id, result) in ids.iter().zip(facade.get_many(class, &ids).await) {
                match result {
                    Ok(Some(entity)) => println!("{}\t{}", id, serde_json::to_string(&entity)?),
                    Ok(None) => println!("{}\tnot found", id),
                    Err(e) => println!("{}\terror: {}", id, e),
                }
            }
        }
    }

    Ok(())
}

fn codec_for(config: &LedgerLinkConfig, class: EntityClass) -> anyhow::Result<IdentifierCodec> {
    let class_config = config
        .class(class)
        .ok_or_else(|| anyhow::anyhow!("{} is not configured", class))?;
    Ok(IdentifierCodec::from_config(class_config)?)
}

fn stamp_codec(config: &LedgerLinkConfig) -> anyhow::Result<TimestampedIdentifierCodec> {
    let salt = config
        .timestamp_salt
        .clone()
        .ok_or_else(|| anyhow::anyhow!("timestamp_salt is not configured"))?;
    Ok(TimestampedIdentifierCodec::new(salt)?)
}
