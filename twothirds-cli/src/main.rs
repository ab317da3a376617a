mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::Context;
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twothirds_core::LedgerError;
use twothirds_game::GameError;

#[derive(Parser)]
#[command(name = "twothirds")]
#[command(about = "Guess two-thirds of the average: commit-reveal game on a local ledger")]
#[command(version)]
struct Cli {
    /// Data directory for chain state and commit secrets
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new local chain with a registry owned by <operator>
    Init {
        operator: String,
        /// Do not mine a block after every transaction
        #[arg(long)]
        manual: bool,
        /// Faucet limit per request in BTC
        #[arg(long)]
        faucet_limit: Option<String>,
        /// Replace an existing chain
        #[arg(long)]
        force: bool,
    },
    /// Credit an account from the dev faucet
    Fund {
        account: String,
        /// Amount in BTC
        amount: String,
    },
    /// Show spendable and withdrawable balances
    Balance { account: String },
    /// Create a game (operator only)
    Create {
        operator: String,
        #[command(flatten)]
        args: commands::CreateArgs,
    },
    /// Commit a hidden guess, paying entry fee and deposit
    Commit {
        account: String,
        /// Game index or address
        game: String,
        /// Guess between 0 and 1000
        number: u64,
        /// Salt to blind the guess (random if omitted)
        #[arg(long)]
        salt: Option<String>,
    },
    /// Reveal a committed guess; uses the stored secret unless given
    Reveal {
        account: String,
        game: String,
        number: Option<u64>,
        salt: Option<String>,
    },
    /// Settle a game after the reveal phase
    Finalize { account: String, game: String },
    /// Withdraw everything a game owes the account
    Withdraw { account: String, game: String },
    /// Transfer value between accounts
    Send {
        account: String,
        to: String,
        /// Amount in BTC
        amount: String,
    },
    /// Advance the block clock
    Mine {
        #[arg(default_value_t = 1)]
        blocks: u64,
    },
    /// Show game status
    Status {
        game: String,
        /// Also show this account's view of the game
        #[arg(short, long)]
        account: Option<String>,
    },
    /// List games in creation order
    List,
    /// Show the event log
    Events {
        /// Only events of this game
        #[arg(short, long)]
        game: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "twothirds={},twothirds_core={},twothirds_game={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CliConfig::new(cli.data_dir, cli.verbose);
    let ctx = Context::open(config).await?;

    // Execute command
    let result = match cli.command {
        Commands::Init {
            operator,
            manual,
            faucet_limit,
            force,
        } => commands::init_chain(&ctx, &operator, manual, faucet_limit.as_deref(), force).await,
        Commands::Fund { account, amount } => commands::fund(&ctx, &account, &amount).await,
        Commands::Balance { account } => commands::show_balance(&ctx, &account).await,
        Commands::Create { operator, args } => commands::create_game(&ctx, &operator, &args).await,
        Commands::Commit {
            account,
            game,
            number,
            salt,
        } => commands::commit(&ctx, &account, &game, number, salt).await,
        Commands::Reveal {
            account,
            game,
            number,
            salt,
        } => commands::reveal(&ctx, &account, &game, number, salt).await,
        Commands::Finalize { account, game } => commands::finalize(&ctx, &account, &game).await,
        Commands::Withdraw { account, game } => commands::withdraw(&ctx, &account, &game).await,
        Commands::Send {
            account,
            to,
            amount,
        } => commands::send(&ctx, &account, &to, &amount).await,
        Commands::Mine { blocks } => commands::mine(&ctx, blocks).await,
        Commands::Status { game, account } => {
            commands::show_game_status(&ctx, &game, account.as_deref()).await
        }
        Commands::List => commands::list_games(&ctx).await,
        Commands::Events { game } => commands::show_events(&ctx, game.as_deref()).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<GameError>() {
            Some(GameError::Ledger(LedgerError::InsufficientFunds { need, available })) => {
                eprintln!("Error: Insufficient funds");
                eprintln!("Need: {} sats, Available: {} sats", need, available);
                eprintln!("Use 'twothirds fund <account> <btc>' to top up");
            }
            Some(GameError::WrongValue { expected, actual }) => {
                eprintln!("Error: Wrong value sent");
                eprintln!("Expected: {} sats, Sent: {} sats", expected, actual);
            }
            Some(err @ (GameError::NotInCommitPhase
            | GameError::NotInRevealPhase
            | GameError::RevealPhaseNotOver)) => {
                eprintln!("Error: {}", err);
                eprintln!("Use 'twothirds status <game>' to see the deadlines");
            }
            Some(err) => {
                eprintln!("Error: {} ({:?})", err, err.kind());
            }
            None => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
