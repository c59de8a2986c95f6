//! Entry point for `rft-over-udp`.
//!
//! Parses CLI arguments and dispatches into either **sender** or **receiver**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing and validation, exit codes).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use rft_over_udp::loss::LossGate;
use rft_over_udp::receiver::{Receiver, ReceiverConfig, FIN_GRACE};
use rft_over_udp::sender::{Sender, SenderConfig};
use rft_over_udp::socket::Socket;

/// Reliable file transfer over a lossy UDP link.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Transmit a file to a waiting receiver.
    Sender {
        /// Local UDP port to bind.
        sender_port: u16,
        /// Receiver's UDP port on localhost.
        recv_port: u16,
        /// File to transmit.
        input_file: PathBuf,
        /// Window budget in bytes; a positive multiple of 1000.
        max_window: usize,
        /// Retransmission timer in milliseconds.
        timer_ms: u64,
        /// Drop probability for outbound SYN/DATA/FIN segments.
        forward_loss: f64,
        /// Drop probability for inbound ACK segments.
        reverse_loss: f64,
    },
    /// Receive a file and write it to disk.
    Receiver {
        /// Local UDP port to bind.
        recv_port: u16,
        /// Sender's UDP port on localhost, where acknowledgments go.
        sender_port: u16,
        /// Destination file for the received bytes.
        output_file: PathBuf,
        /// Window budget in bytes; accepted for interface symmetry.
        max_window: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    // Any argument error exits with status 1, not clap's default.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.role {
        Role::Sender {
            sender_port,
            recv_port,
            input_file,
            max_window,
            timer_ms,
            forward_loss,
            reverse_loss,
        } => {
            if max_window == 0 || max_window % 1000 != 0 {
                anyhow::bail!("max window size should be a positive multiple of 1000");
            }
            for (name, p) in [("forward", forward_loss), ("reverse", reverse_loss)] {
                if !(0.0..=1.0).contains(&p) {
                    anyhow::bail!("{name} loss probability must lie within [0, 1]");
                }
            }

            let data = std::fs::read(&input_file)
                .with_context(|| format!("reading {}", input_file.display()))?;
            let socket = Socket::bind(local_addr(sender_port)).await?;
            let sender = Sender::new(
                socket,
                local_addr(recv_port),
                data,
                SenderConfig {
                    max_window,
                    timer: Duration::from_millis(timer_ms),
                    forward_loss: LossGate::bernoulli(forward_loss),
                    reverse_loss: LossGate::bernoulli(reverse_loss),
                    log_path: PathBuf::from("sender_log.txt"),
                },
            )?;
            let stats = sender.run().await.context("transfer failed")?;
            println!("{}", stats.original_data_acked);
        }
        Role::Receiver {
            recv_port,
            sender_port,
            output_file,
            max_window: _,
        } => {
            let socket = Socket::bind(local_addr(recv_port)).await?;
            let receiver = Receiver::new(
                socket,
                local_addr(sender_port),
                ReceiverConfig {
                    output: output_file,
                    log_path: PathBuf::from("receiver_log.txt"),
                    grace: FIN_GRACE,
                },
            )?;
            receiver.run().await.context("receive failed")?;
        }
    }
    Ok(())
}

fn local_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
