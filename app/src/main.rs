// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

mod abc;
mod bcb;

use bootloader_message::prelude::*;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "blmsg", version)]
#[command(about = "Inspect and update the AB-specific bootloader message", long_about = None)]
struct Cli {
    /// Increase the logging verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Device holding a copy of the bootloader message. Give it twice for redundant storage.
    #[arg(short, long = "device", value_name = "DEV", required = true)]
    devices: Vec<PathBuf>,

    /// Offset of the bootloader message on each device
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Write both copies instead of only the stale one
    #[arg(long)]
    sync: bool,

    /// Allow writes when a single device is given (not power-loss safe)
    #[arg(long)]
    allow_direct_write: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query or update the A/B boot control record
    Abc {
        #[command(subcommand)]
        command: abc::Command,
    },
    /// Query or update the bootloader control block
    Bcb {
        #[command(subcommand)]
        command: bcb::Command,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let options = Options {
        offset: cli.offset,
        sync: cli.sync,
        allow_direct_write: cli.allow_direct_write,
    };

    let result = Misc::open(&cli.devices, &options).and_then(|mut misc| match cli.command {
        Commands::Abc { command } => abc::run(&mut misc, command),
        Commands::Bcb { command } => bcb::run(&mut misc, command),
    });

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
