use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use zynqwired_config::BoardDescriptor;
use zynqwired_core::observer::AccessLog;
use zynqwired_core::snapshot::BoardSnapshot;
use zynqwired_core::{BringupConfig, SimBoard};

#[derive(Parser, Debug)]
#[command(author, version, about = "ZynqWired BRAM bring-up simulator", long_about = None)]
struct Args {
    /// Path to the board descriptor (YAML); defaults to the built-in ZC702-style board
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the base address of the written region (Region A)
    #[arg(long, value_parser = parse_address)]
    write_base: Option<u32>,

    /// Override the base address of the read-back region (Region B)
    #[arg(long, value_parser = parse_address)]
    read_base: Option<u32>,

    /// Enable MMIO-level tracing
    #[arg(short, long)]
    trace: bool,

    /// Do not echo UART output to stdout
    #[arg(long)]
    no_uart_stdout: bool,

    /// Write a JSON snapshot of the board after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn parse_address(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
        .replace('_', "");
    let addr = u32::from_str_radix(&digits, 16)
        .map_err(|e| format!("invalid hex address '{}': {}", s, e))?;
    if addr % 4 != 0 {
        return Err(format!("address {:#x} is not 32-bit aligned", addr));
    }
    Ok(addr)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the UART
    let level = if args.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting ZynqWired");

    let descriptor = if let Some(path) = &args.config {
        info!("Loading board descriptor: {:?}", path);
        BoardDescriptor::from_file(path)?
    } else {
        info!("Using default board configuration");
        BoardDescriptor::default()
    };

    let mut config = BringupConfig::from_board(&descriptor)?;
    if let Some(addr) = args.write_base {
        config.write_base = addr;
    }
    if let Some(addr) = args.read_base {
        config.read_base = addr;
    }
    info!(
        "Region A at {:#x}, Region B at {:#x}",
        config.write_base, config.read_base
    );

    let mut board = SimBoard::from_config(&descriptor, !args.no_uart_stdout)?;
    let log = Arc::new(AccessLog::new());
    board.add_observer(log.clone());

    let code = zynqwired_core::run(&mut board, &config);
    info!(
        "Bring-up exited with {} ({} bus faults)",
        code,
        board.faults().len()
    );

    if let Some(path) = &args.snapshot {
        let snapshot = BoardSnapshot::capture(&board, log.entries());
        std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("Failed to write snapshot to {:?}", path))?;
        info!("Snapshot written to {:?}", path);
    }

    Ok(ExitCode::from(code as u8))
}
