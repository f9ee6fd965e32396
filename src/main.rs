//! Strictly Quoridor - CLI relay
//!
//! Establishes a peer data channel by copy/paste signaling, then relays
//! wire messages: stdin lines out, received messages to stdout. Logs go to
//! stderr so stdout only carries descriptions and messages.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use strictly_quoridor::{
    Description, Handshake, Message, OpponentChannel, PeerChannel, RtcNegotiator, SessionConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SessionConfig::load(cli.command.config().map(|p| p.as_path()))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let channel = match cli.command {
        Command::Serve { .. } => serve(&config, &mut lines).await?,
        Command::Connect { .. } => connect(&config, &mut lines).await?,
    };

    relay(channel, lines).await
}

/// Serving side: print the offer, read the answer.
#[instrument(skip_all)]
async fn serve(config: &SessionConfig, lines: &mut InputLines) -> Result<PeerChannel> {
    let (negotiator, signals) = RtcNegotiator::new(config).await?;
    let mut handshake = Handshake::new(negotiator, signals, config);

    let offer = handshake.serve().await?;
    println!("{}", offer);
    info!("Offer printed, paste the answer");

    let answer = read_description(lines).await?;
    handshake.accept_answer(&answer).await?;
    Ok(handshake.establish().await?)
}

/// Connecting side: read the offer, print the answer.
#[instrument(skip_all)]
async fn connect(config: &SessionConfig, lines: &mut InputLines) -> Result<PeerChannel> {
    let (negotiator, signals) = RtcNegotiator::new(config).await?;
    let mut handshake = Handshake::new(negotiator, signals, config);

    info!("Paste the offer");
    let offer = read_description(lines).await?;
    let answer = handshake.connect(&offer).await?;
    println!("{}", answer);
    info!("Answer printed, waiting for the channel to open");

    Ok(handshake.establish().await?)
}

async fn read_description(lines: &mut InputLines) -> Result<Description> {
    loop {
        let line = lines
            .next_line()
            .await?
            .context("stdin closed before a description arrived")?;
        let blob = line.trim();
        if !blob.is_empty() {
            return Ok(Description::new(blob));
        }
    }
}

/// Relays stdin lines to the peer and peer messages to stdout until either side closes.
#[instrument(skip_all)]
async fn relay(mut channel: PeerChannel, mut lines: InputLines) -> Result<()> {
    info!("Relaying messages");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                match Message::decode(text) {
                    Ok(message) => channel.send(&message).await?,
                    Err(e) => warn!(error = %e, line = %text, "Not a wire message, skipped"),
                }
            }
            message = channel.recv() => {
                let Some(message) = message else {
                    info!("Peer channel closed");
                    break;
                };
                println!("{}", message.encode()?);
            }
        }
    }
    Ok(())
}
