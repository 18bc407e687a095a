// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport layer for monitor communication.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use bootmon_common::config::validate_baud;
use bootmon_common::{Error, Link, ReadMode, Result};

/// Timeout the port is opened with, before the engine picks its own.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Raw 8N1 serial line to the monitor.
///
/// The port is closed when the transport is dropped.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `device` at `baud`, failing with a configuration error for an
    /// unsupported speed or a path that cannot be opened.
    pub fn open(device: &str, baud: u32) -> Result<Self> {
        validate_baud(baud)?;

        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()
            .map_err(|e| Error::Configuration(format!("cannot open {}: {}", device, e)))?;

        log::info!("Opened serial port {} at {} baud", device, baud);

        Ok(Self { port })
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.port.timeout() != timeout {
            self.port
                .set_timeout(timeout)
                .map_err(std::io::Error::from)?;
        }
        Ok(())
    }
}

impl Link for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Result<usize> {
        match mode {
            ReadMode::NonBlocking => {
                let pending = self
                    .port
                    .bytes_to_read()
                    .map_err(std::io::Error::from)?;
                if pending == 0 {
                    return Ok(0);
                }
            }
            ReadMode::Blocking(timeout) => self.set_timeout(timeout)?,
        }

        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::debug!("Closing serial port {}", self.port_name());
    }
}
