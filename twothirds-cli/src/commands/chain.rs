use super::{account, print_receipt, resolve_game, Context};
use anyhow::{anyhow, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use twothirds_core::{parse_btc, ChainConfig, SnapshotStore};
use twothirds_game::{Call, Host, Transaction, SNAPSHOT_NAME};

pub async fn init_chain(
    ctx: &Context,
    operator: &str,
    manual: bool,
    faucet_limit: Option<&str>,
    force: bool,
) -> Result<()> {
    let exists = SnapshotStore::new(&ctx.storage)
        .snapshot_exists(SNAPSHOT_NAME)
        .await?;
    if exists && !force {
        return Err(anyhow!(
            "A chain already exists in {}. Use --force to replace it",
            ctx.config.data_dir().display()
        ));
    }

    let config_path = ctx.config.chain_config_path();
    let mut config = ChainConfig::load_or_default(&config_path)?;
    if manual {
        config.automine = false;
    }
    if let Some(limit) = faucet_limit {
        config = config.with_faucet_limit(limit)?;
    }
    config.save(&config_path)?;

    let operator_address = account(operator)?;
    let host = Host::new(config, operator_address)?;
    ctx.save_host(&host).await?;

    println!("Initialized chain in {}", ctx.config.data_dir().display());
    println!("Operator: {} ({})", operator, operator_address);
    println!("Registry: {}", host.registry().address());
    println!("Height: {}", host.height());
    println!(
        "Mining: {}",
        if host.config().automine {
            "one block per transaction"
        } else {
            "manual ('twothirds mine')"
        }
    );

    Ok(())
}

pub async fn fund(ctx: &Context, name: &str, btc: &str) -> Result<()> {
    let address = account(name)?;
    let amount = parse_btc(btc)?;

    let balance = ctx
        .update(|host| Ok(host.faucet(address, amount)?))
        .await?;

    println!("Funded {} with {} sats", name, amount.to_sat());
    println!(
        "Balance: {} sats ({:.8} BTC)",
        balance.to_sat(),
        balance.to_btc()
    );
    Ok(())
}

pub async fn show_balance(ctx: &Context, name: &str) -> Result<()> {
    let host = ctx.load_host().await?;
    let address = account(name)?;
    let balance = host.balance(&address);

    println!("Balance for '{}' ({}):", name, address);
    println!(
        "  Spendable: {} sats ({:.8} BTC)",
        balance.to_sat(),
        balance.to_btc()
    );

    let owed: Vec<_> = host
        .games()
        .map(|g| (g.address(), g.owed_balance(&address)))
        .filter(|(_, amount)| amount.to_sat() > 0)
        .collect();
    if !owed.is_empty() {
        println!("  Withdrawable:");
        for (game, amount) in owed {
            println!("    {} sats from game {}", amount.to_sat(), game);
        }
    }
    Ok(())
}

pub async fn send(ctx: &Context, name: &str, to: &str, btc: &str) -> Result<()> {
    let from = account(name)?;
    let to = account(to)?;
    let amount = parse_btc(btc)?;

    let (_, receipt) = ctx
        .submit(Transaction::new(from, Call::Transfer { to }).with_value(amount))
        .await?;

    println!("Sent {} sats to {}", amount.to_sat(), to);
    print_receipt(&receipt);
    Ok(())
}

pub async fn mine(ctx: &Context, blocks: u64) -> Result<()> {
    let height = ctx.update(|host| Ok(host.mine(blocks))).await?;

    println!("Mined {} block(s). Height: {}", blocks, height);
    Ok(())
}

pub async fn show_events(ctx: &Context, game: Option<&str>) -> Result<()> {
    let host = ctx.load_host().await?;
    let filter = game.map(|g| resolve_game(&host, g)).transpose()?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Seq", "Block", "Event", "Game", "Details"]);

    let mut shown = 0;
    for record in host.events() {
        if filter.map_or(false, |g| record.event.game() != g) {
            continue;
        }
        table.add_row(vec![
            record.seq.to_string(),
            record.height.to_string(),
            record.event.name().to_string(),
            record.event.game().short(),
            record.event.to_string(),
        ]);
        shown += 1;
    }

    if shown == 0 {
        println!("No events found");
    } else {
        println!("{}", table);
    }
    Ok(())
}
