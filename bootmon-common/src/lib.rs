// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core library for talking to the bootmon serial monitor.
//!
//! The crate holds everything that does not depend on a real serial port:
//! - `hexfile`: Intel-HEX text <-> word-addressed [`MemoryImage`]
//! - `protocol` / `monitor`: the monitor's command grammar and the engine
//!   driving it over any [`Link`]
//! - `transfer`: the download and upload operations
//! - `config`: the resolved session configuration
//!
//! The host binary supplies a serial [`Link`] and a [`Progress`] reporter.

pub mod config;
pub mod error;
pub mod hexfile;
pub mod link;
pub mod memory_map;
pub mod monitor;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod transfer;

// Re-export commonly used types
pub use config::{ChecksumPolicy, Location, Operation, SessionConfig, Settings, VectorPolicy};
pub use error::{Error, Expected, Result};
pub use hexfile::{MemoryImage, MemoryWord};
pub use link::{Link, ReadMode};
pub use memory_map::{AddressClass, MemoryLayout, VectorMap};
pub use monitor::Monitor;
pub use progress::{Progress, Silent, Tick};
pub use session::{CancelToken, ConnectionState};
