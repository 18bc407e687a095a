// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Session configuration.
//!
//! [`Settings`] is the partial, mergeable form read from a TOML file or
//! built from command-line flags. [`Settings::resolve`] fills in the
//! defaults, validates the result and produces the immutable
//! [`SessionConfig`] the rest of the crate works from.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
pub use crate::hexfile::ChecksumPolicy;
use crate::memory_map::MemoryLayout;

pub const DEFAULT_DEVICE: &str = "/dev/ttyS0";
pub const DEFAULT_BAUD: u32 = 57600;

/// Program words read back by an upload (4K-word parts).
pub const DEFAULT_IMAGE_SIZE: u16 = 0x1000;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 1000;

/// Line speeds the serial driver accepts.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Write a hex image to the device.
    Download,
    /// Read the device back into hex text.
    Upload,
    /// Connect and report the boot vector only.
    Probe,
}

/// Hex source for a download or destination for an upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    /// Standard input for downloads, standard output for uploads.
    Stdio,
}

/// What to put at the monitor's boot vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VectorPolicy {
    /// Move the image's reset words (`0..4`) to the vector.
    #[default]
    Relocate,
    /// Ignore the image's reset words and jump to `origin` instead.
    Trampoline { origin: u16 },
}

/// Wait times of the protocol engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// How long each connect probe waits for an answer.
    pub poll_interval: Duration,
    /// How long a command waits for each reply byte.
    pub reply_timeout: Duration,
    /// Give up synchronizing after this long; `None` retries forever.
    pub connect_deadline: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            connect_deadline: None,
        }
    }
}

/// Fully resolved configuration, fixed for the life of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub device: String,
    pub baud: u32,
    pub operation: Operation,
    pub location: Location,
    /// Upload reads program words `0..image_size`.
    pub image_size: u16,
    pub layout: MemoryLayout,
    pub timing: Timing,
    pub vector_policy: VectorPolicy,
    pub checksum: ChecksumPolicy,
    /// Read back every program word after a download.
    pub verify: bool,
    /// Start the application after a download.
    pub launch: bool,
}

/// Partial settings; unset fields fall through to the next source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub device: Option<String>,
    pub baud: Option<u32>,
    pub image_size: Option<u16>,
    pub poll_interval_ms: Option<u64>,
    pub reply_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    /// Program origin for the entry trampoline.
    pub entry: Option<u16>,
    pub verify: Option<bool>,
    pub launch: Option<bool>,
    pub checksum: Option<ChecksumPolicy>,
    pub layout: Option<MemoryLayout>,
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Configuration(format!("invalid settings: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Combine two sources; fields set in `higher` win.
    pub fn merge(self, higher: Settings) -> Settings {
        Settings {
            device: higher.device.or(self.device),
            baud: higher.baud.or(self.baud),
            image_size: higher.image_size.or(self.image_size),
            poll_interval_ms: higher.poll_interval_ms.or(self.poll_interval_ms),
            reply_timeout_ms: higher.reply_timeout_ms.or(self.reply_timeout_ms),
            connect_timeout_ms: higher.connect_timeout_ms.or(self.connect_timeout_ms),
            entry: higher.entry.or(self.entry),
            verify: higher.verify.or(self.verify),
            launch: higher.launch.or(self.launch),
            checksum: higher.checksum.or(self.checksum),
            layout: higher.layout.or(self.layout),
        }
    }

    /// Apply defaults and validate.
    pub fn resolve(self, operation: Operation, location: Location) -> Result<SessionConfig> {
        let baud = self.baud.unwrap_or(DEFAULT_BAUD);
        validate_baud(baud)?;

        let layout = self.layout.unwrap_or_default();
        validate_layout(&layout)?;

        let image_size = self.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);
        if image_size == 0 || image_size > layout.readback.start {
            return Err(Error::Configuration(format!(
                "image size 0x{:X} must be between 1 and 0x{:X} words",
                image_size, layout.readback.start
            )));
        }

        let poll_interval = self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let reply_timeout = self.reply_timeout_ms.unwrap_or(DEFAULT_REPLY_TIMEOUT_MS);
        if poll_interval == 0 || reply_timeout == 0 {
            return Err(Error::Configuration(
                "poll interval and reply timeout must be non-zero".to_string(),
            ));
        }

        let device = self.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string());
        if device.is_empty() {
            return Err(Error::Configuration("empty serial device path".to_string()));
        }

        Ok(SessionConfig {
            device,
            baud,
            operation,
            location,
            image_size,
            layout,
            timing: Timing {
                poll_interval: Duration::from_millis(poll_interval),
                reply_timeout: Duration::from_millis(reply_timeout),
                connect_deadline: self.connect_timeout_ms.map(Duration::from_millis),
            },
            vector_policy: match self.entry {
                Some(origin) => VectorPolicy::Trampoline { origin },
                None => VectorPolicy::Relocate,
            },
            checksum: self.checksum.unwrap_or_default(),
            verify: self.verify.unwrap_or(false),
            launch: self.launch.unwrap_or(true),
        })
    }
}

/// Refuse line speeds the driver cannot set.
pub fn validate_baud(baud: u32) -> Result<()> {
    if SUPPORTED_BAUD_RATES.contains(&baud) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "unsupported baud rate {} (supported: {:?})",
            baud, SUPPORTED_BAUD_RATES
        )))
    }
}

fn validate_layout(layout: &MemoryLayout) -> Result<()> {
    for (name, range) in [
        ("config", &layout.config),
        ("eeprom", &layout.eeprom),
        ("readback", &layout.readback),
    ] {
        if range.start >= range.end {
            return Err(Error::Configuration(format!(
                "{} window 0x{:X}..0x{:X} is empty",
                name, range.start, range.end
            )));
        }
    }
    if layout.readback.len() > 0x100 {
        return Err(Error::Configuration(
            "readback window is larger than the EEPROM address space".to_string(),
        ));
    }
    Ok(())
}
