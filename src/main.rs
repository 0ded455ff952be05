//! XEN Box keeper
//!
//! Command-line front end for the box position engine:
//! - Owned, claimable, force-eligible and referred boxes across both generations
//! - Fee- and penalty-adjusted rewards priced in the chain's reference token
//! - Mint estimates from the ranking service
//! - Fire-and-forget mint, claim, force-renew and referral-reward writes

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use boxkeeper_chain::{
    u256_math::format_units, ContractVersion, EvmGateway, TokenId, TransactionSender, WriteOptions,
};
use boxkeeper_core::{
    load_from_env, reward, ChainConfig, PositionListing, PositionStatus, ReferralStore, SessionContext,
};

/// Environment variable names.
mod env {
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

const DEFAULT_LOG_FILTER: &str = "info,boxkeeper_core=debug,boxkeeper_chain=debug";

#[derive(Parser, Debug)]
#[command(name = "boxkeeper", version, about = "XEN box positions, rewards and referrals")]
struct Cli {
    /// Account to inspect (defaults to the signer's address)
    #[arg(long, env = "ACCOUNT", global = true)]
    account: Option<Address>,

    /// Legacy gas price for writes, in gwei
    #[arg(long, global = true)]
    gas_price_gwei: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Boxes held by an account on every generation
    Owned {
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Held boxes at or past maturity
    Claimable {
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Held upgradeable boxes due for renewal
    Force {
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Matured upgradeable boxes of every owner
    ForceCandidates,
    /// Boxes minted with an account as referrer
    Referral {
        #[arg(long)]
        referrer: Option<Address>,
    },
    /// Look up an owner address or an upgradeable token id
    Search { query: String },
    /// Supply, deployment addresses, locked value and price
    Stats,
    /// Expected reward of a mint
    Estimate {
        #[arg(long, default_value_t = 100)]
        units: u64,
        #[arg(long, default_value_t = 365)]
        term: u64,
    },
    /// Mint a box
    Mint {
        #[arg(long, default_value_t = 100)]
        units: u64,
        #[arg(long, default_value_t = 365)]
        term: u64,
        /// Overrides the captured referral code
        #[arg(long)]
        referrer: Option<Address>,
    },
    /// Claim a matured box and restake for `term` days
    Claim {
        #[arg(long, value_parser = parse_version)]
        version: ContractVersion,
        #[arg(long)]
        token_id: TokenId,
        #[arg(long, default_value_t = 365)]
        term: u64,
    },
    /// Force-renew someone else's matured upgradeable box
    ForceRenew {
        #[arg(long)]
        token_id: TokenId,
        #[arg(long, default_value_t = 365)]
        term: u64,
    },
    /// Withdraw accrued referral rewards
    ClaimReferral,
    /// Record the referral code used for future mints on this chain
    CaptureReferral { code: Address },
}

fn parse_version(value: &str) -> Result<ContractVersion, String> {
    match value.to_ascii_lowercase().as_str() {
        "0" | "v0" | "legacy" => Ok(ContractVersion::Legacy),
        "1" | "v1" | "upgradeable" => Ok(ContractVersion::Upgradeable),
        other => Err(format!("unknown contract version {:?} (expected v0 or v1)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    let cli = Cli::parse();

    print_banner();

    // Chain selection and engine tuning
    let (engine, chain) = load_from_env()?;
    let chain_id = chain.chain.chain_id;
    let rpc_url = chain.rpc_url()?;
    let deployment = chain.deployment()?;

    info!(
        chain_id,
        name = %chain.chain.name,
        profile = %engine.profile,
        upgradeable_box = %deployment.upgradeable_box,
        legacy_box = ?deployment.legacy_box,
        "Chain configured"
    );

    let mut gateway = EvmGateway::new(rpc_url.clone(), chain_id, deployment);
    if let Ok(private_key) = std::env::var(env::PRIVATE_KEY) {
        let sender = TransactionSender::new(&private_key, rpc_url, chain_id)?;
        gateway = gateway.with_sender(sender);
    }

    let account = cli.account.or_else(|| gateway.signer_address());
    let referral_codes = Arc::new(ReferralStore::from_env()?);

    let mut session =
        SessionContext::from_config(engine, &chain, Arc::new(gateway))?.with_referral_store(referral_codes.clone());
    if let Some(account) = account {
        session = session.with_account(account);
    }
    session.start().await;

    let options = WriteOptions {
        gas_price: cli.gas_price_gwei.map(|gwei| gwei as u128 * 1_000_000_000),
    };
    let require_account = |explicit: Option<Address>| -> Result<Address> {
        explicit
            .or(account)
            .context("no account: pass --account or set ACCOUNT")
    };

    match cli.command {
        Command::Owned { owner } => {
            let owner = require_account(owner)?;
            print_listing("Owned", &session.owned(owner).await, &chain);
        }
        Command::Claimable { owner } => {
            let owner = require_account(owner)?;
            print_listing("Claimable", &session.claimable(owner).await, &chain);
        }
        Command::Force { owner } => {
            let owner = require_account(owner)?;
            print_listing("Force-renewable", &session.force_eligible(owner).await, &chain);
        }
        Command::ForceCandidates => {
            print_listing("Force candidates", &session.force_candidates().await?, &chain);
        }
        Command::Referral { referrer } => {
            let referrer = require_account(referrer)?;
            if let Some(state) = session.referral_state().filter(|_| Some(referrer) == account) {
                println!(
                    "Referrer eligible: {}  share: {}%  unclaimed: {} {}",
                    state.account.is_eligible,
                    state.account.refer_fee_percent,
                    format_units(state.account.unclaimed_reward, 18, 4),
                    chain.chain.reward_token
                );
            }
            print_listing("Referred", &session.referral(referrer).await?, &chain);
        }
        Command::Search { query } => {
            print_listing("Search", &session.search(&query).await?, &chain);
        }
        Command::Stats => {
            let stats = session.stats().await;
            let quote = session.price_quote().await;

            println!("Chain {} ({})", chain.chain.name, stats.chain_id);
            for (version, supply) in &stats.total_supply {
                let supply = supply.map_or_else(|| "unavailable".to_string(), |s| s.to_string());
                let address = stats
                    .box_addresses
                    .get(version)
                    .map_or_else(String::new, |a| a.to_string());
                println!("  {} box {}  total supply {}", version, address, supply);
            }
            if let Some(xen) = stats.xen {
                println!("  XEN {}", xen);
            }
            println!(
                "  Locked value {} {}",
                format_units(stats.total_locked_value, 18, 4),
                chain.chain.native_token
            );
            match quote.as_option() {
                Some(price) => println!(
                    "  1 {} = {} {}",
                    chain.chain.reward_token,
                    format_units(price, 18, 12),
                    chain.chain.native_token
                ),
                None => println!("  Price unavailable"),
            }
            println!("  Rank {}", session.rank());
        }
        Command::Estimate { units, term } => {
            let gross = session.estimate_mint_reward(units, term).await;
            let schedules = session.fee_schedules();
            println!(
                "Mint {} accounts for {} days: {} {}",
                units,
                term,
                format_units(gross, 18, 2),
                chain.chain.reward_token
            );
            match reward::net_claimable(gross, units, &schedules, ContractVersion::Upgradeable) {
                Ok(net) => println!("  after fees {} {}", format_units(net, 18, 2), chain.chain.reward_token),
                Err(e) => println!("  after fees: {}", e),
            }
        }
        Command::Mint { units, term, referrer } => {
            let tx_hash = session.mint(units, term, referrer, options).await?;
            print_tx(&chain, tx_hash);
        }
        Command::Claim { version, token_id, term } => {
            let tx_hash = session.claim(version, token_id, term, options).await?;
            print_tx(&chain, tx_hash);
        }
        Command::ForceRenew { token_id, term } => {
            let tx_hash = session.force_renew(token_id, term, options).await?;
            print_tx(&chain, tx_hash);
        }
        Command::ClaimReferral => {
            let tx_hash = session.claim_referral_reward(options).await?;
            print_tx(&chain, tx_hash);
        }
        Command::CaptureReferral { code } => {
            if referral_codes.capture(chain_id, code)? {
                println!("Referral code {} recorded for chain {}", code, chain_id);
            } else {
                let current = referral_codes.get(chain_id).unwrap_or(Address::ZERO);
                println!("Referral code already set for chain {}: {}", chain_id, current);
            }
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `LOG_FORMAT=json` selects JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(env::LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn print_listing(title: &str, listing: &PositionListing, chain: &ChainConfig) {
    let symbol = &chain.chain.reward_token;
    println!("{} ({} boxes)", title, listing.entries.len());

    for view in &listing.entries {
        let Some(record) = &view.record else {
            println!("  {} #{}  data unavailable", view.key.version, view.key.token_id);
            continue;
        };

        let status = match view.status {
            PositionStatus::Unresolved => "unresolved",
            PositionStatus::Locked => "locked",
            PositionStatus::Matured => "matured",
        };
        let maturity = chrono::DateTime::from_timestamp(record.maturity_ts as i64, 0)
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        let net = view
            .net_after_penalty
            .map_or_else(|| "n/a".to_string(), |n| format_units(n, 18, 2));

        print!(
            "  {} #{}  {}  {} accounts  {}d  matures {}  gross {} {}  net {} {}",
            record.version,
            record.token_id,
            status,
            record.unit_count(),
            record.term_days,
            maturity,
            format_units(record.gross_reward, 18, 2),
            symbol,
            net,
            symbol,
        );
        if view.penalty_percent > 0 {
            print!("  (penalty {}%)", view.penalty_percent);
        }
        if let Some(value) = view.reference_value {
            print!("  ~{} {}", format_units(value, 18, 6), chain.chain.native_token);
        }
        if let Some(share) = view.referral_share {
            print!("  referral {} {}", format_units(share, 18, 2), symbol);
        }
        println!();
    }

    for version in &listing.unavailable {
        println!("  {} listing unavailable", version);
    }
}

fn print_tx(chain: &ChainConfig, tx_hash: B256) {
    let hash = tx_hash.to_string();
    match chain.chain.tx_url(&hash) {
        Some(url) => println!("Submitted {}", url),
        None => println!("Submitted {}", hash),
    }
}

/// Print startup banner.
fn print_banner() {
    eprintln!(
        r#"
    ╔╗ ┌─┐─┐ ┬╦╔═┌─┐┌─┐┌─┐┌─┐┬─┐
    ╠╩╗│ │┌┴┬┘╠╩╗├┤ ├┤ ├─┘├┤ ├┬┘
    ╚═╝└─┘┴ └─╩ ╩└─┘└─┘┴  └─┘┴└─
    XEN Box Keeper v0.1.0
    "#
    );
}
