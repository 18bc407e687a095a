// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Address classification for the target's word-addressed memory.
//!
//! Program memory below the monitor is freely writable except for the
//! reset vector, which the monitor owns. The application's reset words
//! (`0..4`) are moved to the vector block the monitor jumps to once it is
//! done, and the four words right below that block are reserved.

use std::ops::{Range, RangeInclusive};

use serde::Deserialize;

/// Words at the start of program memory holding the application's reset code.
pub const RESET_WORDS: u16 = 4;

pub const CONFIG_START: u16 = 0x2000;
pub const CONFIG_END: u16 = 0x2100;
pub const EEPROM_START: u16 = 0x2100;
pub const EEPROM_END: u16 = 0x2200;

/// Highest EEPROM byte address reachable with a 2-digit operand.
pub const EEPROM_MAX_ADDR: u16 = 0xFF;

/// Memory windows that do not depend on the monitor's vector.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryLayout {
    /// Configuration/fuse words, never written by a download.
    pub config: Range<u16>,
    /// EEPROM as it appears in hex files; downloads write these with `E`.
    pub eeprom: Range<u16>,
    /// Window that addressed reads map onto EEPROM, read back by uploads.
    pub readback: Range<u16>,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            config: CONFIG_START..CONFIG_END,
            eeprom: EEPROM_START..EEPROM_END,
            readback: CONFIG_START..CONFIG_END,
        }
    }
}

/// Where an addressed read is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadTarget {
    Program(u16),
    Eeprom(u8),
}

impl MemoryLayout {
    /// Route an addressed read to program memory or EEPROM.
    ///
    /// Returns `None` for addresses past the readback window.
    pub fn read_target(&self, address: u16) -> Option<ReadTarget> {
        if address < self.readback.start {
            Some(ReadTarget::Program(address))
        } else if self.readback.contains(&address) {
            u8::try_from(address - self.readback.start)
                .ok()
                .map(ReadTarget::Eeprom)
        } else {
            None
        }
    }
}

/// Classification of a word address during a download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressClass {
    /// Ordinary program memory, written in place.
    Program,
    /// Configuration/fuse block, skipped.
    Config,
    /// Application reset word, written at `target` instead.
    ResetVector { target: u16 },
    /// One of the four words the monitor jumps to; owned by the relocated
    /// reset vector.
    VectorBlock,
    /// EEPROM byte at `offset`.
    Eeprom { offset: u8 },
    /// Reserved or unknown.
    Invalid,
}

/// Classifier built from the vector the monitor reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorMap {
    vector: u16,
    layout: MemoryLayout,
}

impl VectorMap {
    /// Classifier for a monitor whose boot vector is `vector`.
    pub fn new(vector: u16, layout: MemoryLayout) -> Self {
        Self { vector, layout }
    }

    pub fn vector(&self) -> u16 {
        self.vector
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// The four words right below the vector, never written directly.
    pub fn rom_block(&self) -> RangeInclusive<u16> {
        self.vector.saturating_sub(RESET_WORDS)..=self.vector.saturating_sub(1)
    }

    /// The four words starting at the vector.
    pub fn vector_block(&self) -> Range<u16> {
        self.vector..self.vector.saturating_add(RESET_WORDS)
    }

    /// Where a word the image places at `address` belongs.
    pub fn classify(&self, address: u16) -> AddressClass {
        if address < RESET_WORDS {
            return AddressClass::ResetVector {
                target: self.vector.wrapping_add(address),
            };
        }
        if self.rom_block().contains(&address) {
            return AddressClass::Invalid;
        }
        if self.vector_block().contains(&address) {
            return AddressClass::VectorBlock;
        }
        if address < self.vector {
            return AddressClass::Program;
        }
        if self.layout.config.contains(&address) {
            return AddressClass::Config;
        }
        if self.layout.eeprom.contains(&address) {
            return AddressClass::Eeprom {
                offset: (address - self.layout.eeprom.start) as u8,
            };
        }
        // Between the vector block and the configuration words lives the
        // monitor itself.
        AddressClass::Invalid
    }
}
