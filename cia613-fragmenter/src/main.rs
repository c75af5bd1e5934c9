//! Reads CAN XL frames from `src_if`, fragments anything larger than the
//! configured fragment size, and writes the result to `dst_if`.
//!
//! Mirrors the reference `cia613frag` tool's CLI surface.

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use cia613::config::{FragmenterConfig, DEFAULT_FRAG_SIZE};
use cia613::fragment::Fragmenter;
use cia613::io::FrameIo;
use cia613::xlsocket::XlSocket;
use clap::Parser;

/// CAN XL CiA 613-3 sender.
#[derive(Parser)]
#[command(name = "cia613-fragmenter")]
struct Cli {
    /// Fragment size in bytes.
    #[arg(short = 'f', default_value_t = DEFAULT_FRAG_SIZE)]
    fragsz: u16,

    /// Transfer ID (hex), e.g. 242.
    #[arg(short = 't', default_value = "242", value_parser = parse_hex_u16)]
    transfer_id: u16,

    /// Set virtual CAN network ID (hex).
    #[arg(short = 'V', value_parser = parse_hex_u8)]
    vcid: Option<u8>,

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

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s, 16).map_err(|e| e.to_string())
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

fn run(cli: Cli) -> Result<()> {
    let config = FragmenterConfig::new(cli.fragsz, cli.transfer_id, cli.vcid)
        .context("invalid fragmenter configuration")?;

    let mut src = XlSocket::open(&cli.src_if).context("opening source interface")?;
    src.set_filter(XlSocket::transfer_id_filter(config.transfer_id))?;
    let mut dst = XlSocket::open(&cli.dst_if).context("opening destination interface")?;
    if let Some(vcid) = config.vcid {
        dst.set_tx_vcid(vcid).context("setting virtual CAN network ID")?;
    }

    let mut fragmenter = Fragmenter::new();

    loop {
        let frame = src.recv_frame().context("reading source frame")?;
        log::debug!("RX {frame}");

        if cia613::reassemble::is_fragment(&frame) {
            log::warn!("detected tunnel encapsulation -> frame dropped");
            continue;
        }

        let frames = fragmenter.fragment(&frame, config.fragsz)?;
        if frames.is_empty() {
            bail!("fragmenter produced no output for a non-tunnel frame");
        }
        for out in frames.iter() {
            dst.send_frame(out).context("writing destination frame")?;
            log::debug!("TX {out}");
        }
    }
}
