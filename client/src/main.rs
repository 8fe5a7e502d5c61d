use clap::Parser;
use client::consumer::Presenter;
use client::controller::GameController;
use client::network::ClientError;
use client::ClientConfig;
use log::{error, info, warn};
use shared::ModelChangeEvent;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Player name shown to the opponent
    #[arg(short = 'n', long)]
    name: String,

    /// How often the server is polled for changes
    #[arg(long, default_value = "2000")]
    poll_interval_ms: u64,

    /// How often queued changes are shown
    #[arg(long, default_value = "500")]
    drain_interval_ms: u64,

    /// Give up on a request after this long
    #[arg(long, default_value = "5")]
    request_timeout_secs: u64,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            server: self.server.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            drain_interval: Duration::from_millis(self.drain_interval_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// One line typed by the player
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Play,
    Move(usize, usize),
    Reset,
    Board,
    Help,
    Quit,
}

impl ConsoleInput {
    fn parse(line: &str) -> Option<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["play"] => Some(ConsoleInput::Play),
            ["reset"] => Some(ConsoleInput::Reset),
            ["board"] => Some(ConsoleInput::Board),
            ["help"] => Some(ConsoleInput::Help),
            ["quit"] | ["exit"] => Some(ConsoleInput::Quit),
            [row, column] => Some(ConsoleInput::Move(row.parse().ok()?, column.parse().ok()?)),
            _ => None,
        }
    }
}

const HELP: &str = "Commands: play | <row> <column> | board | reset | quit";

/// Prints board changes and results to the terminal
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn cell_changed(&mut self, change: &ModelChangeEvent) {
        println!("{} played ({}, {})", change.mark, change.row, change.column);
    }

    fn game_over(&mut self, winner: &str) {
        println!("Game over! {} wins. Type 'play' to start a new game.", winner);
    }

    fn game_started(&mut self) {
        println!("Game started, please play");
    }

    fn session_reset(&mut self) {
        println!("The game was reset. Type 'play' to join again.");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.config();

    info!("Starting client...");
    info!("Connecting to: {}", config.server);

    let mut controller = GameController::connect(&config).await?;
    let mut presenter = ConsolePresenter;

    join(&mut controller, &args.name).await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut drain_interval = interval(config.drain_interval);

    loop {
        tokio::select! {
            _ = drain_interval.tick() => {
                if let Err(e) = controller.tick(&mut presenter).await {
                    warn!("Could not finish the game: {}", e);
                }
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        break;
                    }
                };

                match ConsoleInput::parse(&line) {
                    Some(ConsoleInput::Play) => join(&mut controller, &args.name).await,
                    Some(ConsoleInput::Move(row, column)) => {
                        match controller.submit_move(row, column).await {
                            Ok(()) => {}
                            Err(ClientError::NotStarted) => println!("Waiting for players..."),
                            Err(e) => match e.rejection() {
                                Some(reason) if reason.is_invalid_move() => {
                                    println!("Pick another cell: {}", reason)
                                }
                                Some(reason) => println!("Move refused: {}", reason),
                                None => warn!("Move failed: {}", e),
                            },
                        }
                    }
                    Some(ConsoleInput::Reset) => {
                        if let Err(e) = controller.reset().await {
                            warn!("Reset failed: {}", e);
                        }
                    }
                    Some(ConsoleInput::Board) => println!("{}", controller.board().board()),
                    Some(ConsoleInput::Help) | None => println!("{}", HELP),
                    Some(ConsoleInput::Quit) => break,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    if let Err(e) = controller.leave().await {
        warn!("Could not leave the game cleanly: {}", e);
    }
    controller.shutdown().await;

    Ok(())
}

async fn join(controller: &mut GameController, name: &str) {
    match controller.register(name).await {
        Ok(Some(mark)) => println!("Joined as {} playing {}", name, mark),
        Ok(None) => println!("The game is full, try again later"),
        Err(e) => warn!("Registration failed: {}", e),
    }
}
