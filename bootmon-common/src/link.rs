// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Byte-level link to the monitor.

use std::time::Duration;

use crate::error::Result;

/// How long a read may wait for the first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Return whatever is already buffered, possibly nothing.
    NonBlocking,
    /// Wait up to the given time for at least one byte.
    Blocking(Duration),
}

/// Raw serial line: no framing, no flow control.
///
/// An empty read is not an error; callers decide what silence means.
pub trait Link {
    /// Write bytes verbatim.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `buf.len()` bytes and return how many arrived.
    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Result<usize>;

    /// Read a single byte, `None` if nothing arrived in time.
    fn read_byte(&mut self, mode: ReadMode) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte, mode)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Result<usize> {
        (**self).read(buf, mode)
    }
}

impl<L: Link + ?Sized> Link for &mut L {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Result<usize> {
        (**self).read(buf, mode)
    }
}
