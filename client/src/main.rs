use clap::Parser;
use client::bot::{Action, Bot};
use client::GameClient;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::ClientMessage;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Player name
    #[arg(short = 'n', long)]
    name: String,

    /// Named session to join; matchmaking is used when omitted
    #[arg(short = 'g', long)]
    game: Option<String>,

    /// Create the named session instead of joining it
    #[arg(short = 'c', long, requires = "game")]
    create: bool,

    /// Password for the named session
    #[arg(short = 'p', long, requires = "game")]
    password: Option<String>,

    /// Delay before each move in milliseconds
    #[arg(short = 'd', long, default_value = "250")]
    delay_ms: u64,

    /// Seed for move selection
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut client = GameClient::connect(&args.server).await?;
    match (&args.game, args.create) {
        (Some(game), true) => {
            info!("Creating '{}' as '{}'", game, args.name);
            client.create(game, &args.name, args.password.as_deref()).await?;
        }
        (Some(game), false) => {
            info!("Joining '{}' as '{}'", game, args.name);
            client.join(game, &args.name, args.password.as_deref()).await?;
        }
        (None, _) => {
            info!("Looking for a match as '{}'", args.name);
            client.matchmake(&args.name).await?;
        }
    }

    let mut bot = Bot::new(rng);
    while let Some(message) = client.recv().await? {
        match bot.handle(&message) {
            Action::Send(reply) => {
                tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
                client.send(&reply).await?;
            }
            Action::Wait => {}
            Action::Finished(outcome) => {
                match outcome.winner() {
                    Some(winner) if Some(winner) == bot.role() => info!("We won"),
                    Some(_) => info!("We lost"),
                    None => info!("Draw"),
                }
                client.send(&ClientMessage::Leave).await?;
                break;
            }
            Action::Failed(kind, reason) => {
                error!("Server refused: {:?}: {}", kind, reason);
                return Err(reason.into());
            }
        }
    }

    client.close().await?;
    Ok(())
}
