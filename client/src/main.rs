use clap::Parser;
use client::input::InputParser;
use client::network::Client;
use log::info;
use shared::BROADCAST_ROUTE;
use std::time::Duration;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Route plain lines are sent on
    #[arg(short = 'r', long, default_value = BROADCAST_ROUTE)]
    route: String,

    /// Seconds between keep-alive heartbeats
    #[arg(long, default_value = "10")]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Type a message and press Enter; /quit to leave");

    let mut client =
        Client::new(&args.server, Duration::from_secs(args.heartbeat_secs.max(1))).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    client.run(stdin, InputParser::new(args.route)).await?;

    Ok(())
}
