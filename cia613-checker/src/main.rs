//! Conformance-checks a peer's CiA 613-3 segmentation behavior on a single
//! CAN XL interface and emits a notification frame for every state
//! transition.
//!
//! Mirrors the reference `cia613check` tool's CLI surface.

use std::process::ExitCode;

use anyhow::Context;
use cia613::checker::Checker;
use cia613::config::CheckerConfig;
use cia613::io::FrameIo;
use cia613::notify::notification_frame;
use cia613::xlsocket::XlSocket;
use clap::Parser;

/// CAN XL CiA 613-3 conformance checker.
#[derive(Parser)]
#[command(name = "cia613-checker")]
struct Cli {
    /// Maximum number of concurrently assembling buffers, 1..=15.
    #[arg(short = 'b', default_value_t = cia613::config::DEFAULT_MAXBUFFS)]
    maxbuffs: u8,

    /// Low-priority starvation threshold, >= 1.
    #[arg(short = 'l', default_value_t = cia613::config::DEFAULT_MAXLPCNT)]
    maxlpcnt: u8,

    /// Verbose logging.
    #[arg(short = 'v')]
    verbose: bool,

    /// CAN XL interface to monitor.
    canxl_if: String,
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
    let config =
        CheckerConfig::new(cli.maxbuffs, cli.maxlpcnt).context("invalid checker configuration")?;

    let mut link = XlSocket::open(&cli.canxl_if).context("opening CAN XL interface")?;
    link.set_filter(XlSocket::checker_filter())
        .context("installing checker filter")?;

    let mut checker = Checker::new(config);

    loop {
        let frame = link.recv_frame().context("reading frame")?;
        log::debug!("RX {frame}");

        let events = checker.process(&frame)?;
        for event in events.iter() {
            log::info!(
                "tid {:#04x}: {} ({:#04x})",
                event.tid,
                event.notification.description(),
                event.notification.code()
            );

            let state = checker.state();
            let notify = notification_frame(event.tid, event.notification, state)
                .context("building notification frame")?;
            link.send_frame(&notify).context("writing notification frame")?;
        }
    }
}
