mod cli;
mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use peripheral_bsp::{rpi, Board};
use peripheral_manager::{DriverParams, PeripheralContext, PeripheralService, PinMuxCallbacks};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let board = match &cli.board {
        Some(path) => Board::load(path)
            .with_context(|| format!("loading board {}", path.display()))?,
        None => rpi::board(),
    };

    let params = DriverParams {
        gpio_sysfs_root: cli.sysfs_root,
        dev_root: cli.dev_root,
        ..DriverParams::default()
    };
    let ctx = PeripheralContext::with_default_drivers(&params)
        .context("registering drivers")?;
    let report = board.apply(&ctx, &PinMuxCallbacks::new());
    if !report.skipped.is_empty() {
        warn!(
            board = %board.name,
            skipped = report.skipped.len(),
            "board applied partially"
        );
    }
    ctx.seal_drivers();

    let service = PeripheralService::new(Arc::new(ctx));
    commands::run(&service, cli.command)
}
