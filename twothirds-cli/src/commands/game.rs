use super::{account, print_receipt, resolve_game, Context};
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use twothirds_core::{parse_btc, Address, CommitSecret, SecretStore};
use twothirds_game::{
    generate_salt, Call, Event, Guess, Outcome, Phase, PlayerState, Transaction, MAX_GUESS,
};

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Entry fee in BTC
    #[arg(long, default_value = "0.1")]
    pub entry_fee: String,
    /// Service fee as a percentage of the pot (1-100)
    #[arg(long, default_value_t = 10)]
    pub service_fee: u8,
    /// Refundable deposit as a percentage of the entry fee (1-100)
    #[arg(long, default_value_t = 50)]
    pub deposit: u8,
    /// Commit phase length in blocks
    #[arg(long, default_value_t = 50)]
    pub commit_window: u64,
    /// Reveal phase length in blocks
    #[arg(long, default_value_t = 50)]
    pub reveal_window: u64,
    #[arg(long, default_value_t = 10)]
    pub max_players: u32,
}

impl CreateArgs {
    fn params(&self) -> Result<twothirds_game::GameParams> {
        Ok(twothirds_game::GameParams {
            entry_fee: parse_btc(&self.entry_fee)?,
            service_fee_percent: self.service_fee,
            deposit_percent: self.deposit,
            commit_window: self.commit_window,
            reveal_window: self.reveal_window,
            max_players: self.max_players,
        })
    }
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Commit => "Commit",
        Phase::Reveal => "Reveal",
        Phase::Finalizable => "Finalizable",
    }
}

pub async fn create_game(ctx: &Context, operator: &str, args: &CreateArgs) -> Result<()> {
    let caller = account(operator)?;
    let params = args.params()?;

    let (host, receipt) = ctx
        .submit(Transaction::new(caller, Call::CreateInstance(params)))
        .await?;
    let address = receipt
        .created_game()
        .ok_or_else(|| anyhow!("Creation receipt carries no game"))?;
    let game = host.game(&address)?;

    println!("Created game #{}", host.registry().count() - 1);
    println!("Address: {}", address);
    println!(
        "Entry: {} sats + {} sats deposit",
        game.entry_fee().to_sat(),
        game.deposit_amount().to_sat()
    );
    println!("Commits close at block {}", game.commit_deadline());
    println!("Reveals close at block {}", game.reveal_deadline());
    print_receipt(&receipt);
    Ok(())
}

pub async fn commit(
    ctx: &Context,
    player: &str,
    game_ref: &str,
    number: u64,
    salt: Option<String>,
) -> Result<()> {
    if number > MAX_GUESS {
        tracing::warn!(
            "{} is above {}; this commitment can never be revealed",
            number,
            MAX_GUESS
        );
    }

    let caller = account(player)?;
    let host = ctx.load_host().await?;
    let game = resolve_game(&host, game_ref)?;
    let value = host.game(&game)?.commit_value();

    let guess = Guess::new(number, salt.unwrap_or_else(generate_salt));
    let commitment = guess.commitment();

    // The opening must be on disk before value is committed
    let secrets = SecretStore::new(&ctx.storage);
    let previous = secrets.load_secret(&game, &caller).await?;
    secrets
        .save_secret(&CommitSecret {
            game,
            player: caller,
            number: guess.number,
            salt: guess.salt.clone(),
            created_at: Utc::now(),
        })
        .await?;

    let submitted = ctx
        .submit(Transaction::new(caller, Call::Commit { game, commitment }).with_value(value))
        .await;
    let receipt = match submitted {
        Ok((_, receipt)) => receipt,
        Err(e) => {
            restore_secret(&secrets, &game, &caller, previous).await?;
            return Err(e);
        }
    };

    println!("Committed {} to game {}", player, game);
    println!("Paid: {} sats", value.to_sat());
    println!("Commitment: {}", commitment);
    println!("Salt: {} (stored locally for reveal)", guess.salt);
    print_receipt(&receipt);
    Ok(())
}

pub async fn reveal(
    ctx: &Context,
    player: &str,
    game_ref: &str,
    number: Option<u64>,
    salt: Option<String>,
) -> Result<()> {
    let caller = account(player)?;
    let host = ctx.load_host().await?;
    let game = resolve_game(&host, game_ref)?;
    let secrets = SecretStore::new(&ctx.storage);

    let (number, salt) = match (number, salt) {
        (Some(number), Some(salt)) => (number, salt),
        (None, None) => {
            let secret = secrets.load_secret(&game, &caller).await?.ok_or_else(|| {
                anyhow!(
                    "No stored commitment for {} in game {}. Pass <number> <salt> explicitly",
                    player,
                    game
                )
            })?;
            (secret.number, secret.salt)
        }
        _ => return Err(anyhow!("Pass both <number> and <salt>, or neither")),
    };

    let (host, receipt) = ctx
        .submit(Transaction::new(
            caller,
            Call::Reveal { game, number, salt },
        ))
        .await?;
    secrets.delete_secret(&game, &caller).await?;

    println!("Revealed {} for {} in game {}", number, player, game);
    println!(
        "Deposit refunded to withdrawable balance: {} sats",
        host.game(&game)?.owed_balance(&caller).to_sat()
    );
    print_receipt(&receipt);
    Ok(())
}

pub async fn finalize(ctx: &Context, caller: &str, game_ref: &str) -> Result<()> {
    let caller = account(caller)?;
    let host = ctx.load_host().await?;
    let game = resolve_game(&host, game_ref)?;

    let (host, receipt) = ctx
        .submit(Transaction::new(caller, Call::Finalize { game }))
        .await?;

    match host.game(&game)?.outcome() {
        Some(Outcome::Won {
            winner,
            winning_number,
            target,
            payout,
            service_fee,
            forfeited,
        }) => {
            println!("Game {} finalized", game);
            println!("Target: {}", target);
            println!("Winner: {} with {}", winner, winning_number);
            println!("Payout: {} sats", payout.to_sat());
            println!("Service fee: {} sats", service_fee.to_sat());
            if forfeited.to_sat() > 0 {
                println!("Forfeited deposits: {} sats", forfeited.to_sat());
            }
        }
        Some(Outcome::Refunded {
            players,
            refund_each,
            forfeited,
        }) => {
            println!("Game {} finalized without reveals", game);
            println!(
                "Refunded {} sats to each of {} players",
                refund_each.to_sat(),
                players
            );
            println!("Forfeited deposits: {} sats", forfeited.to_sat());
        }
        None => {}
    }
    println!("Use 'twothirds withdraw <account> {}' to collect", game_ref);
    print_receipt(&receipt);
    Ok(())
}

pub async fn withdraw(ctx: &Context, name: &str, game_ref: &str) -> Result<()> {
    let caller = account(name)?;
    let host = ctx.load_host().await?;
    let game = resolve_game(&host, game_ref)?;

    let (host, receipt) = ctx
        .submit(Transaction::new(caller, Call::Withdraw { game }))
        .await?;

    for record in &receipt.events {
        if let Event::Withdrawn { amount, .. } = &record.event {
            println!("Withdrew {} sats from game {}", amount.to_sat(), game);
        }
    }
    println!("Balance: {} sats", host.balance(&caller).to_sat());
    Ok(())
}

pub async fn show_game_status(ctx: &Context, game_ref: &str, name: Option<&str>) -> Result<()> {
    let host = ctx.load_host().await?;
    let address = resolve_game(&host, game_ref)?;
    let game = host.game(&address)?;
    let info = game.get_info(host.height());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec!["Address".to_string(), info.address.to_string()]);
    table.add_row(vec!["Operator".to_string(), info.operator.to_string()]);
    table.add_row(vec![
        "Phase".to_string(),
        format!("{} ({})", phase_name(info.phase), info.phase.as_u8()),
    ]);
    table.add_row(vec!["Height".to_string(), host.height().to_string()]);
    table.add_row(vec![
        "Entry fee".to_string(),
        format!("{} sats", info.entry_fee.to_sat()),
    ]);
    table.add_row(vec![
        "Deposit".to_string(),
        format!(
            "{} sats ({}%)",
            info.deposit_amount.to_sat(),
            info.deposit_percent
        ),
    ]);
    table.add_row(vec![
        "Service fee".to_string(),
        format!("{}%", info.service_fee_percent),
    ]);
    table.add_row(vec![
        "Commit deadline".to_string(),
        info.commit_deadline.to_string(),
    ]);
    table.add_row(vec![
        "Reveal deadline".to_string(),
        info.reveal_deadline.to_string(),
    ]);
    table.add_row(vec![
        "Players".to_string(),
        format!("{}/{}", info.total_players, info.max_players),
    ]);
    table.add_row(vec!["Pot".to_string(), format!("{} sats", info.pot.to_sat())]);
    table.add_row(vec!["Finalized".to_string(), info.executed.to_string()]);
    table.add_row(vec![
        "Winner".to_string(),
        match (info.winner, info.winning_number) {
            (Some(winner), Some(number)) => format!("{} ({})", winner, number),
            _ => "-".to_string(),
        },
    ]);
    println!("{}", table);

    if info.total_players > 0 {
        let mut players = Table::new();
        players.load_preset(UTF8_FULL);
        players.set_header(vec!["Player", "State", "Number", "Reveal #", "Deposit", "Owed"]);
        for (player, record) in game.players() {
            let state = match record.state() {
                PlayerState::Committed => "Committed",
                PlayerState::Revealed => "Revealed",
                PlayerState::Forfeited => "Forfeited",
            };
            players.add_row(vec![
                player.short(),
                state.to_string(),
                record
                    .revealed_value()
                    .map_or_else(|| "-".to_string(), |n| n.to_string()),
                reveal_position(game, player)
                    .map_or_else(|| "-".to_string(), |i| i.to_string()),
                record.deposit().to_sat().to_string(),
                game.owed_balance(player).to_sat().to_string(),
            ]);
        }
        println!("{}", players);
    }

    if let Some(name) = name {
        let caller = account(name)?;
        print_account_view(game, name, &caller);
    }
    Ok(())
}

/// Put back whatever opening was stored before a failed commit
async fn restore_secret(
    secrets: &SecretStore<'_>,
    game: &Address,
    player: &Address,
    previous: Option<CommitSecret>,
) -> Result<()> {
    match previous {
        Some(secret) => secrets.save_secret(&secret).await?,
        None => secrets.delete_secret(game, player).await?,
    }
    Ok(())
}

/// 1-based position among successful reveals; earlier wins ties
fn reveal_position(game: &twothirds_game::Game, player: &Address) -> Option<usize> {
    game.reveal_order()
        .iter()
        .position(|a| a == player)
        .map(|i| i + 1)
}

fn print_account_view(game: &twothirds_game::Game, name: &str, caller: &Address) {
    println!("Account '{}':", name);
    match game.player(caller) {
        Some(record) => {
            println!("  Commitment: {}", record.commitment());
            println!("  Revealed: {}", record.has_revealed());
            if let Some(value) = record.revealed_value() {
                println!("  Number: {}", value);
            }
            if let Some(position) = reveal_position(game, caller) {
                println!("  Reveal order: {}", position);
            }
            println!("  Deposit held: {} sats", record.deposit().to_sat());
        }
        None => println!("  Not a player"),
    }
    println!("  Withdrawable: {} sats", game.owed_balance(caller).to_sat());
}

pub async fn list_games(ctx: &Context) -> Result<()> {
    let host = ctx.load_host().await?;
    let height = host.height();

    if host.registry().count() == 0 {
        println!("No games found");
        println!("Use 'twothirds create <operator>' to create one");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "#", "Address", "Phase", "Entry (sats)", "Players", "Pot (sats)", "Winner",
    ]);

    for (index, game) in host.games().enumerate() {
        let phase = if game.executed() {
            "Finalized".to_string()
        } else {
            phase_name(game.phase(height)).to_string()
        };
        table.add_row(vec![
            index.to_string(),
            game.address().to_string(),
            phase,
            game.entry_fee().to_sat().to_string(),
            format!("{}/{}", game.total_players(), game.max_players()),
            game.pot().to_sat().to_string(),
            game.winner().map_or_else(|| "-".to_string(), |w| w.short()),
        ]);
    }

    println!("Registry {} at height {}", host.registry().address(), height);
    println!("{}", table);
    Ok(())
}
