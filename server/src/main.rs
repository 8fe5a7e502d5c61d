use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Close connections that stay silent this long
    #[arg(long, default_value = "300")]
    read_timeout_secs: u64,

    /// Give up on a response write after this long
    #[arg(long, default_value = "5")]
    write_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        read_timeout: Duration::from_secs(args.read_timeout_secs),
        write_timeout: Duration::from_secs(args.write_timeout_secs),
    };

    let address = format!("{}:{}", args.host, args.port);
    info!("Starting tic-tac-toe server on {}", address);

    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
