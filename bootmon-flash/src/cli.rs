// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use bootmon_common::{CancelToken, ChecksumPolicy, Location, Operation, Settings};

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "bootmon")]
#[command(about = "Download and upload tool for the bootmon serial monitor")]
pub struct Cli {
    /// Serial port (default /dev/ttyS0)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate (default 57600)
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Settings file (TOML); command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Wait this long for each reply byte
    #[arg(long, value_name = "MS")]
    pub reply_timeout: Option<u64>,

    /// Give up synchronizing after this long (default: retry until Ctrl-C)
    #[arg(long, value_name = "MS")]
    pub connect_timeout: Option<u64>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print warnings and errors, no progress
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Write an Intel-HEX file to the device and start it
    Download {
        /// Hex file, or - for standard input
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Read every word back before launching
        #[arg(long)]
        verify: bool,

        /// Stay in the monitor after writing
        #[arg(long)]
        no_launch: bool,

        /// Accept records with a wrong checksum
        #[arg(long)]
        ignore_checksum: bool,

        /// Jump to this program origin instead of relocating the image's reset vector
        #[arg(long, value_name = "ADDR", value_parser = parse_word)]
        entry: Option<u16>,
    },

    /// Read the device back as Intel-HEX
    Upload {
        /// Output file; standard output when omitted or -
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Number of program words to read (default 0x1000)
        #[arg(short, long, value_name = "WORDS", value_parser = parse_word)]
        size: Option<u16>,
    },

    /// Connect and print the monitor's boot vector
    Probe,
}

impl Cli {
    /// Settings given on the command line.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings {
            device: self.port.clone(),
            baud: self.baud,
            reply_timeout_ms: self.reply_timeout,
            connect_timeout_ms: self.connect_timeout,
            ..Settings::default()
        };

        match &self.command {
            Commands::Download {
                verify,
                no_launch,
                ignore_checksum,
                entry,
                ..
            } => {
                settings.verify = verify.then_some(true);
                settings.launch = no_launch.then_some(false);
                settings.checksum = ignore_checksum.then_some(ChecksumPolicy::Ignore);
                settings.entry = *entry;
            }
            Commands::Upload { size, .. } => settings.image_size = *size,
            Commands::Probe => {}
        }

        settings
    }

    pub fn operation(&self) -> (Operation, Location) {
        match &self.command {
            Commands::Download { file, .. } => (Operation::Download, location(Some(file.as_path()))),
            Commands::Upload { file, .. } => (Operation::Upload, location(file.as_deref())),
            Commands::Probe => (Operation::Probe, Location::Stdio),
        }
    }
}

fn location(path: Option<&Path>) -> Location {
    match path {
        Some(p) if p != Path::new("-") => Location::File(p.to_path_buf()),
        _ => Location::Stdio,
    }
}

/// Parse a word count or address, decimal or `0x` hex.
fn parse_word(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid value '{}': {}", s, e))
}

/// Resolve the configuration and execute the parsed CLI command.
pub fn run(cli: Cli, cancel: CancelToken) -> Result<()> {
    let from_file = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let (operation, location) = cli.operation();
    let config = from_file
        .merge(cli.settings())
        .resolve(operation, location)?;

    commands::execute(&config, cli.quiet, cancel)
}
