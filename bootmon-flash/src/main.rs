// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Download and upload tool for the bootmon serial monitor.
//!
//! Usage:
//!   bootmon --port /dev/ttyS0 download firmware.hex
//!   bootmon --port /dev/ttyS0 --baud 19200 upload dump.hex --size 0x2000
//!   bootmon --port /dev/ttyS0 probe
//!
//! An interrupted download leaves a partially written image on the device;
//! run the download again to complete it.

mod cli;
mod commands;
mod transport;

use std::process::ExitCode;

use clap::Parser;

use bootmon_common::{CancelToken, Error};

fn main() -> ExitCode {
    let args = cli::Cli::parse();
    init_logging(args.verbose, args.quiet);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("Cannot install Ctrl-C handler: {}", e);
    }

    match cli::run(args, cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_cancelled(&e) => {
            eprintln!("Aborted by user");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<Error>(), Some(Error::Cancelled)))
}
