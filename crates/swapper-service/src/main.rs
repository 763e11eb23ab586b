use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use swapper_config::{ConfigLoader, SwapperConfig};
use swapper_consumer::{AffiliateFee, AffiliateFeeType};
use swapper_quote::RfqMode;
use swapper_types::{Address, MarketOperation, NULL_ADDRESS, U256};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod service;

use service::{SwapRequest, SwapperService};

#[derive(Parser)]
#[command(name = "asset-swapper")]
#[command(about = "Quotes token swaps and encodes exchange proxy calldata", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "SWAPPER_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Quote a swap and print the quote with its calldata as JSON
	Quote(QuoteArgs),
	/// Validate the configuration file
	Validate,
	/// Fetch the top pools once and report how many pairs were cached
	Pools,
	/// Keep the pool cache refreshing until interrupted
	Warm,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
	Sell,
	Buy,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeeKind {
	Percentage,
	PositiveSlippage,
}

#[derive(Clone, Copy, ValueEnum)]
enum RfqKind {
	Indicative,
	Firm,
}

#[derive(Args)]
struct QuoteArgs {
	#[arg(long, value_enum, default_value = "sell")]
	side: Side,

	/// Token to sell; 0xeeee...eeee for ether
	#[arg(long)]
	sell_token: String,

	/// Token to buy; 0xeeee...eeee for ether
	#[arg(long)]
	buy_token: String,

	/// Sell amount for sells, buy amount for buys, in base units
	#[arg(long)]
	amount: String,

	/// Worst-case slippage as a fraction, e.g. 0.01
	#[arg(long)]
	slippage: Option<Decimal>,

	/// Overrides the configured gas price
	#[arg(long)]
	gas_price_gwei: Option<u64>,

	#[arg(long)]
	taker: Option<String>,

	#[arg(long, value_enum)]
	rfq: Option<RfqKind>,

	/// Include the sources considered in the output
	#[arg(long)]
	report: bool,

	#[arg(long)]
	sell_entire_balance: bool,

	#[arg(long, value_enum)]
	fee: Option<FeeKind>,

	#[arg(long)]
	fee_recipient: Option<String>,

	/// Buy token fee, in base units
	#[arg(long)]
	fee_amount: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match &cli.command {
		Commands::Quote(args) => quote(&cli, args).await,
		Commands::Validate => validate_config(&cli).await,
		Commands::Pools => refresh_pools(&cli).await,
		Commands::Warm => warm_pools(&cli).await,
	}
}

async fn load_config(cli: &Cli) -> Result<SwapperConfig> {
	info!("Loading configuration from: {:?}", cli.config);
	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn quote(cli: &Cli, args: &QuoteArgs) -> Result<()> {
	let config = load_config(cli).await?;
	let service = SwapperService::new(config).context("Failed to build swapper service")?;

	let request = swap_request(args)?;
	let response = service.quote(&request).await?;

	let output = serde_json::to_string_pretty(&response).context("Failed to serialize quote")?;
	println!("{}", output);
	Ok(())
}

fn swap_request(args: &QuoteArgs) -> Result<SwapRequest> {
	let side = match args.side {
		Side::Sell => MarketOperation::Sell,
		Side::Buy => MarketOperation::Buy,
	};
	let mut request = SwapRequest::new(
		side,
		parse_address("sell-token", &args.sell_token)?,
		parse_address("buy-token", &args.buy_token)?,
		parse_amount("amount", &args.amount)?,
	);
	request.slippage = args.slippage;
	request.gas_price = args
		.gas_price_gwei
		.map(|gwei| U256::from(gwei) * U256::from(1_000_000_000u64));
	request.taker = args
		.taker
		.as_deref()
		.map(|taker| parse_address("taker", taker))
		.transpose()?;
	request.rfq_mode = args.rfq.map(|kind| match kind {
		RfqKind::Indicative => RfqMode::Indicative,
		RfqKind::Firm => RfqMode::Firm,
	});
	request.include_quote_report = args.report;
	request.should_sell_entire_balance = args.sell_entire_balance;

	if let Some(kind) = args.fee {
		let recipient = args
			.fee_recipient
			.as_deref()
			.map(|recipient| parse_address("fee-recipient", recipient))
			.transpose()?
			.unwrap_or(NULL_ADDRESS);
		if recipient == NULL_ADDRESS {
			warn!("Affiliate fee without a recipient is not charged");
		}
		let buy_token_fee_amount = args
			.fee_amount
			.as_deref()
			.map(|amount| parse_amount("fee-amount", amount))
			.transpose()?
			.unwrap_or_default();
		request.affiliate_fee = AffiliateFee {
			fee_type: match kind {
				FeeKind::Percentage => AffiliateFeeType::PercentageFee,
				FeeKind::PositiveSlippage => AffiliateFeeType::PositiveSlippageFee,
			},
			recipient,
			buy_token_fee_amount,
			sell_token_fee_amount: U256::ZERO,
		};
	}

	Ok(request)
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
	Address::from_str(value).with_context(|| format!("Invalid {} address: {}", name, value))
}

fn parse_amount(name: &str, value: &str) -> Result<U256> {
	U256::from_str(value).with_context(|| format!("Invalid {}: {}", name, value))
}

async fn validate_config(cli: &Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	let config = load_config(cli).await?;

	info!("Configuration is valid");
	info!("Chain id: {}", config.swapper.chain_id);
	info!("Sampler backend: {}", config.sampler.backend);
	info!("Exchange proxy: {}", config.contracts.exchange_proxy);
	info!(
		"RFQ makers: {} standard, {} alt",
		config.rfq.makers.len(),
		config.rfq.alt_makers.len()
	);

	Ok(())
}

async fn refresh_pools(cli: &Cli) -> Result<()> {
	let config = load_config(cli).await?;
	let service = SwapperService::new(config).context("Failed to build swapper service")?;

	let pairs = service.refresh_pools().await?;
	info!("Cached pools for {} pairs", pairs);
	println!("{}", pairs);
	Ok(())
}

async fn warm_pools(cli: &Cli) -> Result<()> {
	info!("Starting pool cache refresh");
	let config = load_config(cli).await?;
	let service = SwapperService::new(config).context("Failed to build swapper service")?;

	let refresh_handle = service.spawn_pool_refresh()?;
	if let Some(cache) = service.pools_cache() {
		info!("Refreshing top pools every {:?}", cache.config().refresh_interval);
	}

	setup_shutdown_signal().await;

	info!("Shutdown signal received, stopping pool refresh...");
	refresh_handle.abort();

	info!("Pool refresh stopped");
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			warn!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				warn!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_quote_args_build_request() {
		let cli = Cli::try_parse_from([
			"asset-swapper",
			"quote",
			"--side",
			"buy",
			"--sell-token",
			"0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
			"--buy-token",
			"0x6b175474e89094c44da98b954eedeac495271d0f",
			"--amount",
			"1000000000000000000",
			"--slippage",
			"0.01",
			"--fee",
			"percentage",
			"--fee-recipient",
			"0x7777777777777777777777777777777777777777",
			"--fee-amount",
			"5000",
		])
		.unwrap();
		assert_eq!(cli.config, PathBuf::from("config/local.toml"));

		let Commands::Quote(args) = &cli.command else {
			panic!("expected the quote command");
		};
		let request = swap_request(args).unwrap();
		assert_eq!(request.side, MarketOperation::Buy);
		assert_eq!(request.sell_token, swapper_types::ETH_TOKEN_ADDRESS);
		assert_eq!(request.amount, U256::from(1_000_000_000_000_000_000u64));
		assert_eq!(request.slippage, Some(Decimal::new(1, 2)));
		assert_eq!(request.affiliate_fee.fee_type, AffiliateFeeType::PercentageFee);
		assert_eq!(request.affiliate_fee.buy_token_fee_amount, U256::from(5_000u64));
		assert!(request.rfq_mode.is_none());
	}

	#[test]
	fn test_bad_amount_is_rejected() {
		let cli = Cli::try_parse_from([
			"asset-swapper",
			"quote",
			"--sell-token",
			"0x6b175474e89094c44da98b954eedeac495271d0f",
			"--buy-token",
			"0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
			"--amount",
			"lots",
		])
		.unwrap();
		let Commands::Quote(args) = &cli.command else {
			panic!("expected the quote command");
		};
		assert!(swap_request(args).is_err());
	}
}
