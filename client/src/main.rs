mod commands;

use anyhow::Result;
use commands::{Command, DrawChoice};
use rami_node::config::USAGE;
use rami_node::{start_node, telemetry, Card, NodeConfig, NodeHandle, ProposeOutcome};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

type Input = Lines<BufReader<Stdin>>;

const NOT_STARTED: &str = "Game not started yet. Waiting for game initialization...";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match NodeConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            eprintln!("{}", USAGE);
            eprintln!("Example (local): rami P1 8001");
            eprintln!("Example (distributed): rami P1 8001 192.168.1.10");
            std::process::exit(1);
        }
    };

    telemetry::init_tracing(&config.player_id, &config.log_dir)?;
    let player_id = config.player_id.clone();
    let node = start_node(config).await?;

    print_help(&player_id);
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(&format!("[{}] > ", player_id));
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            line = input.next_line() => line?,
        };
        // Ctrl-C and end of input both leave the table
        let Some(line) = line else {
            info!(player = %player_id, "Input closed, leaving the table");
            node.announce_quit().await?;
            break;
        };

        match commands::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => {
                info!(player = %player_id, "Leaving the table");
                node.announce_quit().await?;
                break;
            }
            Ok(Some(command)) => run(command, &node, &mut input).await?,
            Err(e) => println!("{}", e),
        }
    }
    Ok(())
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

fn print_help(player_id: &str) {
    println!("[{}] Commands:", player_id);
    for (usage, description) in commands::HELP {
        println!("  {:<18} -> {}", usage, description);
    }
}

fn format_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(Card::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn report(action: &str, outcome: ProposeOutcome) {
    match outcome {
        ProposeOutcome::Proposed(proposed) => {
            println!("Proposed {} (action {})", action, proposed.action_id)
        }
        ProposeOutcome::NoToken => println!("Cannot {}: no token.", action),
        ProposeOutcome::NoGame => println!("{}", NOT_STARTED),
    }
}

async fn run(command: Command, node: &NodeHandle, input: &mut Input) -> Result<()> {
    match command {
        Command::Draw => {
            let snapshot = node.snapshot().await?;
            let Some(piles) = snapshot.game else {
                println!("{}", NOT_STARTED);
                return Ok(());
            };
            print_piles(&piles);
            loop {
                prompt("Draw from deck or discard? [deck/discard/cancel]: ");
                let answer = input.next_line().await?.unwrap_or_default();
                match commands::parse_draw_choice(&answer, &piles) {
                    DrawChoice::Source(source) => {
                        report("draw", node.try_draw(source).await?);
                        break;
                    }
                    DrawChoice::Cancel => {
                        println!("Canceled draw request.");
                        break;
                    }
                    DrawChoice::Retry(reason) => println!("{}", reason),
                }
            }
        }
        Command::Piles => match node.snapshot().await?.game {
            Some(piles) => print_piles(&piles),
            None => println!("{}", NOT_STARTED),
        },
        Command::Discard(card) => report("discard", node.try_discard(&card).await?),
        Command::Win(groups) => report("declare win", node.try_declare_win(groups).await?),
        Command::Hand => {
            let snapshot = node.snapshot().await?;
            if snapshot.game.is_none() {
                println!("{}", NOT_STARTED);
            } else {
                println!("{}", format_cards(&snapshot.my_hand));
            }
        }
        Command::State => match node.snapshot().await?.game {
            Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            None => println!("{}", NOT_STARTED),
        },
        Command::Token => {
            let snapshot = node.snapshot().await?;
            match snapshot.token_holder {
                Some(holder) => println!("Token holder: {}", holder),
                None => println!("Token holder: none"),
            }
        }
        Command::Help => print_help(node.player_id()),
        Command::Quit => node.announce_quit().await?,
    }
    Ok(())
}

fn print_piles(piles: &rami_node::GameSummary) {
    let deck_top = piles.deck_top.map_or("Empty".to_string(), |c| c.to_string());
    let discard_top = piles
        .discard_top
        .map_or("Empty".to_string(), |c| c.to_string());
    println!("\n-- Piles --");
    println!(
        "Draw pile top: {} ({} cards remaining)",
        deck_top, piles.deck_size
    );
    println!("Discard pile top: {}", discard_top);
}
