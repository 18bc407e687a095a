// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error kinds shared by the hex model, the protocol engine and the transfers.

use core::fmt;

use thiserror::Error;

/// What the engine was waiting for when a reply went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expected {
    /// A specific acknowledgment character.
    Byte(u8),
    /// Any hexadecimal digit, either case.
    HexDigit,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Byte(b) => write!(f, "{}", printable(*b)),
            Expected::HexDigit => f.write_str("a hex digit"),
        }
    }
}

/// Errors raised by bootmon operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad device path, unsupported baud rate or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An Intel-HEX line could not be decoded.
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Unexpected byte while synchronizing, usually a wrong baud rate.
    #[error("bad connection: monitor sent {}", printable(*.byte))]
    BadConnection { byte: u8 },

    /// Unexpected or missing reply byte during a command exchange.
    #[error(
        "protocol error on '{}' command: expected {expected}, got {}",
        char::from(*.command),
        describe_reply(.actual)
    )]
    Protocol {
        command: u8,
        expected: Expected,
        actual: Option<u8>,
    },

    /// Address outside every known memory class.
    #[error("invalid address 0x{0:04X}")]
    InvalidAddress(u16),

    /// A command was issued before the handshake completed.
    #[error("monitor is not connected")]
    NotConnected,

    /// The connect deadline expired without an acknowledgment.
    #[error("no answer from monitor after {attempts} probes")]
    ConnectTimeout { attempts: u32 },

    /// Read-back after download differs from what was written.
    #[error("verify failed at 0x{address:04X}: wrote 0x{expected:04X}, read 0x{actual:04X}")]
    VerifyMismatch {
        address: u16,
        expected: u16,
        actual: u16,
    },

    /// The user interrupted the session.
    #[error("cancelled by user")]
    Cancelled,

    /// The image could not be written out as Intel-HEX.
    #[error("cannot render hex image: {0}")]
    Render(#[from] ihex::WriterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}

/// Result type for bootmon operations.
pub type Result<T> = core::result::Result<T, Error>;

fn describe_reply(actual: &Option<u8>) -> String {
    match actual {
        Some(byte) => printable(*byte),
        None => "nothing (timeout)".to_string(),
    }
}

/// Render a wire byte for diagnostics.
pub fn printable(byte: u8) -> String {
    if byte.is_ascii_graphic() || byte == b' ' {
        format!("'{}'", byte as char)
    } else {
        format!("0x{:02X}", byte)
    }
}
