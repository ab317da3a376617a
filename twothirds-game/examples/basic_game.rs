use bitcoin::Amount;
use tempfile::tempdir;
use twothirds_core::{Address, ChainConfig, Storage};
use twothirds_game::{Call, Guess, GameParams, Host, Node, Transaction};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    let operator = Address::from_label("operator");
    let mut host = Host::new(ChainConfig::default(), operator)?;

    let players = [("alice", 300u64), ("bob", 600), ("carol", 900)];
    for (name, _) in &players {
        host.faucet(Address::from_label(name), Amount::from_sat(100_000_000))?;
    }
    let node = Node::new(host);

    let params = GameParams {
        entry_fee: Amount::from_sat(10_000_000),
        service_fee_percent: 10,
        deposit_percent: 50,
        commit_window: 10,
        reveal_window: 10,
        max_players: 10,
    };
    let game = node
        .submit(Transaction::new(operator, Call::CreateInstance(params)))?
        .created_game()
        .ok_or("no game created")?;
    println!("Created game {}", game);

    let value = node.read(|h| h.game(&game).map(|g| g.commit_value()))?;
    for (name, number) in &players {
        let commitment = Guess::new(*number, format!("{}-salt", name)).commitment();
        node.submit(
            Transaction::new(Address::from_label(name), Call::Commit { game, commitment })
                .with_value(value),
        )?;
        println!("{} committed {}", name, commitment);
    }

    node.mine(10);
    for (name, number) in &players {
        node.submit(Transaction::new(
            Address::from_label(name),
            Call::Reveal {
                game,
                number: *number,
                salt: format!("{}-salt", name),
            },
        ))?;
        println!("{} revealed {}", name, number);
    }

    node.mine(10);
    let receipt = node.submit(Transaction::new(operator, Call::Finalize { game }))?;
    for record in &receipt.events {
        println!("{}", record.event);
    }

    for (name, _) in &players {
        let who = Address::from_label(name);
        node.submit(Transaction::new(who, Call::Withdraw { game }))?;
        println!("{} balance: {} sats", name, node.read(|h| h.balance(&who)).to_sat());
    }

    let storage = Storage::new(&temp_dir.path().join("twothirds.db")).await?;
    node.snapshot().save(&storage).await?;
    println!("\nSaved chain at height {}", node.height());

    Ok(())
}
