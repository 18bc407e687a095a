// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for monitor operations.

use std::fs;
use std::io::{self, Read, Write};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use bootmon_common::progress::Phase;
use bootmon_common::{transfer, CancelToken, Location, MemoryImage, Monitor, Operation};
use bootmon_common::{Progress, SessionConfig, Silent, Tick};

use crate::transport::SerialTransport;

/// Open the line, synchronize and run the configured operation.
///
/// The hex input is parsed before the port is opened so a bad file never
/// reaches the device.
pub fn execute(config: &SessionConfig, quiet: bool, cancel: CancelToken) -> Result<()> {
    let image = match config.operation {
        Operation::Download => Some(load_image(config)?),
        Operation::Upload | Operation::Probe => None,
    };

    let mut reporter: Box<dyn Progress> = if quiet {
        Box::new(Silent)
    } else {
        Box::new(BarReporter::default())
    };

    let transport = SerialTransport::open(&config.device, config.baud)
        .with_context(|| format!("Failed to open serial port {}", config.device))?;
    let mut monitor =
        Monitor::new(transport, config.timing, cancel).with_layout(config.layout.clone());

    log::info!("Waiting for monitor (press Ctrl-C to abort)...");
    monitor.connect(reporter.as_mut())?;

    match image {
        Some(image) => download(&mut monitor, &image, config, reporter.as_mut()),
        None if config.operation == Operation::Upload => {
            upload(&mut monitor, config, reporter.as_mut())
        }
        None => probe(&mut monitor),
    }
}

/// Read and parse the hex source.
pub fn load_image(config: &SessionConfig) -> Result<MemoryImage> {
    let (text, name) = match &config.location {
        Location::File(path) => (
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            path.display().to_string(),
        ),
        Location::Stdio => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read standard input")?;
            (text, "<stdin>".to_string())
        }
    };

    let image = MemoryImage::parse(&text, config.checksum)
        .with_context(|| format!("Failed to parse {}", name))?;
    if image.is_empty() {
        bail!("{} contains no data records", name);
    }

    log::info!("Loaded {} words from {}", image.len(), name);
    Ok(image)
}

/// Write the image to the device.
pub fn download(
    monitor: &mut Monitor<SerialTransport>,
    image: &MemoryImage,
    config: &SessionConfig,
    progress: &mut dyn Progress,
) -> Result<()> {
    let report = transfer::download(monitor, image, config, progress)?;

    println!(
        "Successfully transferred {} program words and {} EEPROM bytes ({} skipped)",
        report.program_words, report.eeprom_bytes, report.skipped
    );
    if report.verified {
        println!("Verify OK");
    }
    if report.launched {
        println!("Application launched");
    } else {
        println!(
            "Monitor left running on {}; reset the device to start the application.",
            monitor.link().port_name()
        );
    }

    Ok(())
}

/// Read the device back and write it as Intel-HEX.
pub fn upload(
    monitor: &mut Monitor<SerialTransport>,
    config: &SessionConfig,
    progress: &mut dyn Progress,
) -> Result<()> {
    let image = transfer::upload(monitor, config.image_size, progress)?;
    let text = transfer::render_upload(&image, config.image_size, &config.layout)?;

    match &config.location {
        Location::File(path) => {
            fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} words to {}", image.len(), path.display());
        }
        Location::Stdio => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Report the monitor's boot vector.
pub fn probe(monitor: &mut Monitor<SerialTransport>) -> Result<()> {
    let vector = monitor.query_vector()?;
    println!("Monitor on {}", monitor.link().port_name());
    println!("  Boot vector: 0x{:04X}", vector);
    println!(
        "  Reserved:    0x{:04X}-0x{:04X}",
        vector.saturating_sub(4),
        vector.saturating_sub(1)
    );
    Ok(())
}

/// Spinner while synchronizing, bar while transferring.
#[derive(Default)]
struct BarReporter {
    spinner: Option<ProgressBar>,
    bar: Option<ProgressBar>,
}

impl Progress for BarReporter {
    fn waiting(&mut self) {
        self.spinner
            .get_or_insert_with(|| {
                let spinner = ProgressBar::new_spinner();
                spinner.set_message("Waiting for monitor...");
                spinner
            })
            .tick();
    }

    fn rejected(&mut self, attempts: u32, _byte: u8) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{} garbled replies, check the baud rate", attempts));
        }
    }

    fn connected(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        eprintln!("Connected");
    }

    fn begin(&mut self, phase: Phase, total: usize) {
        let label = match phase {
            Phase::Download => "write",
            Phase::Verify => "verify",
            Phase::Upload => "read",
        };
        let style = ProgressStyle::default_bar()
            .template(
                "{prefix:>6} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} words ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix(label);
        self.bar = Some(bar);
    }

    fn advance(&mut self, done: usize, tick: Tick) {
        if let Some(bar) = &self.bar {
            bar.set_position(done as u64);
        }
        if let Tick::Line { kilowords } = tick {
            log::debug!("{}k words", kilowords);
        }
    }

    fn finish(&mut self, done: usize) {
        if let Some(bar) = self.bar.take() {
            bar.set_position(done as u64);
            bar.finish();
        }
    }
}
