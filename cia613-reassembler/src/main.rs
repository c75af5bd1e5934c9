//! Reads CAN XL frames from `src_if`, reassembles any CiA 613-3 fragment
//! sequence bound to a single Transfer ID, and writes the result to
//! `dst_if`.
//!
//! Mirrors the reference `cia613join` tool's CLI surface.

use std::process::ExitCode;

use anyhow::Context;
use cia613::io::FrameIo;
use cia613::reassemble::{Outcome, Reassembler};
use cia613::xlsocket::XlSocket;
use clap::Parser;

/// CAN XL CiA 613-3 receiver.
#[derive(Parser)]
#[command(name = "cia613-reassembler")]
struct Cli {
    /// Transfer ID (hex), e.g. 242.
    #[arg(short = 't', default_value = "242", value_parser = parse_hex_u16)]
    transfer_id: u16,

    /// Verbose logging.
    #[arg(short = 'v')]
    verbose: bool,

    /// Source CAN XL interface.
    src_if: String,

    /// Destination CAN XL interface.
    dst_if: String,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s, 16).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.transfer_id > 0x7FF {
        anyhow::bail!("transfer id out of range");
    }

    let mut src = XlSocket::open(&cli.src_if).context("opening source interface")?;
    src.set_filter(XlSocket::transfer_id_filter(cli.transfer_id))?;
    let mut dst = XlSocket::open(&cli.dst_if).context("opening destination interface")?;

    let mut reassembler = Reassembler::new();

    loop {
        let frame = src.recv_frame().context("reading source frame")?;
        log::debug!("RX {frame}");

        match reassembler.process(&frame)? {
            Outcome::Forward(frame) => {
                dst.send_frame(&frame).context("forwarding frame")?;
                log::debug!("FW {frame}");
            }
            Outcome::Complete(frame) => {
                dst.send_frame(&frame).context("writing reassembled frame")?;
                log::debug!("TX {frame}");
            }
            Outcome::Pending => {}
            Outcome::Dropped(reason) => {
                log::warn!("dropped frame: {reason:?}");
            }
        }
    }
}
