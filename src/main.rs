//! pump-shield CLI
//!
//! Builds one trade request from the command line, runs it and prints the result.

use clap::{Parser, Subcommand};
use pump_shield::orchestrator::{BuyReceipt, SellReceipt};
use pump_shield::risk::RiskReport;
use pump_shield::{
    shorten_address, Config, LoopParams, Orchestrator, Result, TradeOp, TradeOutcome,
    TradeRequest,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pump-shield")]
#[command(about = "Risk-gated pump.fun trading through a private bundle relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Caller identity used for the cooldown and the audit log
    #[arg(long, global = true, default_value = "cli")]
    caller: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Buy a token with SOL
    Buy {
        /// Token mint address
        target: String,

        /// SOL to spend (randomized slightly before submission)
        sol: f64,

        /// Trade even if the token scores as high risk
        #[arg(long)]
        force: bool,
    },

    /// Sell a percentage of the held balance
    Sell {
        /// Token mint address
        target: String,

        /// Percentage of the balance to sell, in (0, 100]
        percent: f64,
    },

    /// Show the token and SOL balance of the token's wallet
    Balance {
        /// Token mint address
        target: String,
    },

    /// Score rug-pull risk
    Rugcheck {
        /// Token mint address
        target: String,
    },

    /// Sell everything now if the token scores as high risk
    Auto {
        /// Token mint address
        target: String,
    },

    /// Repeated buy/sell rounds
    Loop {
        /// Token mint address
        target: String,

        /// SOL per buy
        #[arg(long)]
        buy: f64,

        /// Percentage of the balance sold after each buy
        #[arg(long)]
        sell: f64,

        /// Seconds to wait after each buy and each sell
        #[arg(long, default_value_t = 5)]
        delay: u64,

        /// Number of rounds (defaults to trading.loop_rounds)
        #[arg(long)]
        rounds: Option<u32>,

        /// Trade even if the token scores as high risk
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    let (target, op) = match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Buy { target, sol, force } => (
            target,
            TradeOp::Buy {
                sol_amount: sol,
                force,
            },
        ),
        Commands::Sell { target, percent } => (target, TradeOp::Sell { percent }),
        Commands::Balance { target } => (target, TradeOp::Balance),
        Commands::Rugcheck { target } => (target, TradeOp::RugCheck),
        Commands::Auto { target } => (target, TradeOp::AutoProtect),
        Commands::Loop {
            target,
            buy,
            sell,
            delay,
            rounds,
            force,
        } => (
            target,
            TradeOp::Loop(LoopParams {
                buy_sol: buy,
                sell_percent: sell,
                delay: Duration::from_secs(delay),
                rounds: rounds.unwrap_or(config.trading.loop_rounds),
                force,
            }),
        ),
    };

    tracing::info!(
        relay = %config.relay.url,
        rpc_endpoints = config.rpc.endpoints.len(),
        wallet_file = %config.wallet_file,
        "Starting pump-shield"
    );

    let orchestrator = Orchestrator::from_config(&config);
    let request = TradeRequest::new(cli.caller, target, op);

    match orchestrator.handle(request).await {
        Ok(outcome) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "error": e.to_string(), "kind": e.kind() })
                );
            } else {
                eprintln!("❌ {}", e);
            }
            std::process::exit(1);
        }
    }
}

fn print_outcome(outcome: &TradeOutcome) {
    match outcome {
        TradeOutcome::Bought(receipt) => print_buy(receipt),
        TradeOutcome::Sold(receipt) => print_sell(receipt),
        TradeOutcome::Balance(report) => {
            println!("💰 Balance for {}", shorten_address(&report.target));
            println!("   Tokens: {}", report.balance.token_amount);
            println!("   SOL:    {:.6}", report.balance.sol);
            println!("   Wallet: {}", report.wallet);
        }
        TradeOutcome::Risk(report) => print_risk(report),
        TradeOutcome::Protection(report) => {
            print_risk(&report.risk);
            match &report.sale {
                Some(sale) => {
                    println!("🚨 High risk: sold entire balance");
                    print_sell(sale);
                }
                None if report.risk.risk => println!("🚨 High risk, no tokens held. No action needed."),
                None => println!("✅ Risk low. Monitoring, no action taken."),
            }
        }
        TradeOutcome::Loop(summary) => {
            println!(
                "🔁 Loop for {}: {}/{} rounds",
                shorten_address(&summary.target),
                summary.rounds_completed,
                summary.rounds_requested
            );
            for buy in &summary.buys {
                print_buy(buy);
            }
            for sell in &summary.sells {
                print_sell(sell);
            }
            if let Some(reason) = &summary.aborted {
                println!("⚠️ Stopped early: {}", reason);
            }
        }
    }
}

fn print_buy(receipt: &BuyReceipt) {
    println!("✅ Buy submitted");
    println!("   Amount: {:.5} SOL", receipt.sol_amount);
    println!("   Token:  {}", shorten_address(&receipt.target));
    println!("   Wallet: {}", shorten_address(&receipt.wallet));
    println!("   TX:     {}", receipt.link);
}

fn print_sell(receipt: &SellReceipt) {
    println!("✅ Sell submitted");
    println!("   Percentage:   {}%", receipt.percent);
    println!("   Token amount: {}", receipt.token_amount);
    println!("   Token:  {}", shorten_address(&receipt.target));
    println!("   Wallet: {}", shorten_address(&receipt.wallet));
    println!("   TX:     {}", receipt.link);
}

fn print_risk(report: &RiskReport) {
    let verdict = if report.risk { "HIGH RISK" } else { "low risk" };
    println!("🛡️ Rug check: {} (score {})", verdict, report.score_label());
    for factor in &report.factors {
        println!("   • {}", factor);
    }
    if let Some(reason) = &report.reason {
        println!("   Reason: {}", reason);
    }
}
