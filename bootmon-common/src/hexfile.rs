// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Intel-HEX parsing and rendering for word-addressed program memory.
//!
//! The hex file counts bytes while the device counts 16-bit words, so a byte
//! at file address `b` lands in word `b / 2`: even bytes fill the low half,
//! odd bytes the high half. Parsing `12 34` at an even address therefore
//! yields the word `0x3412`.

use std::collections::BTreeMap;
use std::ops::Range;

use ihex::{ReaderError, Record};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Words per rendered data record (16 bytes of payload).
pub const WORDS_PER_RECORD: u16 = 8;

/// Words programmed at once by the device's flash write.
pub const BLOCK_WORDS: u16 = 4;

/// The fixed end-of-file record.
pub const EOF_RECORD: &str = ":00000001FF";

/// Whether record checksums are verified while parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    #[default]
    Strict,
    /// Accept records whatever their checksum byte says.
    Ignore,
}

/// One device word and its word address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryWord {
    pub address: u16,
    pub value: u16,
}

/// Sparse word-addressed memory contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryImage {
    words: BTreeMap<u16, u16>,
}

impl MemoryImage {
    /// An empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse Intel-HEX text and pad every touched 4-word block.
    pub fn parse(text: &str, checksum: ChecksumPolicy) -> Result<Self> {
        Self::from_lines(text.lines(), checksum)
    }

    /// Parse a sequence of Intel-HEX lines.
    ///
    /// Blank lines are skipped and everything after the end-of-file record
    /// is ignored. Once all records are applied, each present word's 4-word
    /// block is completed with zeros.
    pub fn from_lines<I, S>(lines: I, checksum: ChecksumPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut image = Self::new();
        let mut base: u32 = 0;
        let mut seen_eof = false;

        for (index, line) in lines.into_iter().enumerate() {
            let number = index + 1;
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }

            match decode_record(line, checksum).map_err(|e| malformed(number, e))? {
                Record::Data { offset, value } => {
                    let start = base + u32::from(offset);
                    for (i, byte) in value.iter().enumerate() {
                        image.put_byte(start + i as u32, *byte, number)?;
                    }
                }
                Record::EndOfFile => {
                    seen_eof = true;
                    break;
                }
                Record::ExtendedSegmentAddress(segment) => base = u32::from(segment) << 4,
                Record::ExtendedLinearAddress(upper) => base = u32::from(upper) << 16,
                Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {
                    log::debug!("line {}: ignoring start address record", number);
                }
            }
        }

        if !seen_eof {
            log::warn!("hex input has no end-of-file record");
        }

        image.fill_blocks();
        Ok(image)
    }

    fn put_byte(&mut self, byte_addr: u32, byte: u8, line: usize) -> Result<()> {
        let address = u16::try_from(byte_addr / 2).map_err(|_| {
            Error::malformed(line, format!("byte address 0x{:X} out of range", byte_addr))
        })?;
        let word = self.words.entry(address).or_insert(0);
        *word = if byte_addr % 2 == 0 {
            (*word & 0xFF00) | u16::from(byte)
        } else {
            (*word & 0x00FF) | (u16::from(byte) << 8)
        };
        Ok(())
    }

    /// Complete every 4-word block that holds at least one word.
    pub fn fill_blocks(&mut self) {
        let blocks: Vec<u16> = self
            .words
            .keys()
            .map(|addr| addr & !(BLOCK_WORDS - 1))
            .collect();
        for block in blocks {
            for addr in block..=block + (BLOCK_WORDS - 1) {
                self.words.entry(addr).or_insert(0);
            }
        }
    }

    /// Set one word, returning the value it replaces.
    pub fn insert(&mut self, address: u16, value: u16) -> Option<u16> {
        self.words.insert(address, value)
    }

    /// The word at `address`, if the image covers it.
    pub fn get(&self, address: u16) -> Option<u16> {
        self.words.get(&address).copied()
    }

    /// Whether the image covers `address`.
    pub fn contains(&self, address: u16) -> bool {
        self.words.contains_key(&address)
    }

    /// Number of words present.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = MemoryWord> + '_ {
        self.words.iter().map(|(&address, &value)| MemoryWord { address, value })
    }

    /// Render the given word windows as Intel-HEX text.
    ///
    /// Each window is cut at 8-word boundaries into 16-byte records; words
    /// missing from the image are left out, splitting the record. An
    /// extended linear address record is emitted whenever the byte address
    /// crosses into another 64 KiB page.
    pub fn render(&self, windows: &[Range<u16>]) -> Result<String> {
        let mut records = Vec::new();
        let mut upper: u16 = 0;

        for window in windows {
            let mut run: Vec<u16> = Vec::with_capacity(WORDS_PER_RECORD as usize);
            let mut run_start = window.start;

            for addr in window.clone() {
                if addr % WORDS_PER_RECORD == 0 && !run.is_empty() {
                    push_data(&mut records, &mut upper, run_start, &run);
                    run.clear();
                }
                match self.get(addr) {
                    Some(value) => {
                        if run.is_empty() {
                            run_start = addr;
                        }
                        run.push(value);
                    }
                    None if !run.is_empty() => {
                        push_data(&mut records, &mut upper, run_start, &run);
                        run.clear();
                    }
                    None => {}
                }
            }
            if !run.is_empty() {
                push_data(&mut records, &mut upper, run_start, &run);
            }
        }
        records.push(Record::EndOfFile);

        let mut text = ihex::create_object_file_representation(&records)?;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}

impl FromIterator<MemoryWord> for MemoryImage {
    fn from_iter<T: IntoIterator<Item = MemoryWord>>(iter: T) -> Self {
        let mut image = Self::new();
        image.extend(iter);
        image
    }
}

impl Extend<MemoryWord> for MemoryImage {
    fn extend<T: IntoIterator<Item = MemoryWord>>(&mut self, iter: T) {
        for word in iter {
            self.words.insert(word.address, word.value);
        }
    }
}

fn push_data(records: &mut Vec<Record>, upper: &mut u16, first_word: u16, words: &[u16]) {
    let byte_addr = u32::from(first_word) * 2;
    let page = (byte_addr >> 16) as u16;
    if page != *upper {
        records.push(Record::ExtendedLinearAddress(page));
        *upper = page;
    }

    records.push(Record::Data {
        offset: byte_addr as u16,
        value: words.iter().flat_map(|w| w.to_le_bytes()).collect(),
    });
}

/// Decode one record line. With [`ChecksumPolicy::Ignore`] a wrong checksum
/// byte is replaced by the right one and the line decoded again.
fn decode_record(line: &str, policy: ChecksumPolicy) -> core::result::Result<Record, ReaderError> {
    match Record::from_record_string(line) {
        Err(ReaderError::ChecksumMismatch(a, b)) if policy == ChecksumPolicy::Ignore => {
            let (body, stored) = line.split_at(line.len() - 2);
            let stored = u8::from_str_radix(stored, 16).ok();
            let computed = if stored == Some(a) { b } else { a };
            Record::from_record_string(&format!("{}{:02X}", body, computed))
        }
        other => other,
    }
}

fn malformed(line: usize, error: ReaderError) -> Error {
    let reason = match error {
        ReaderError::MissingStartCode => "missing ':' start code".to_string(),
        ReaderError::RecordTooShort => "record too short".to_string(),
        ReaderError::RecordTooLong => "record too long".to_string(),
        ReaderError::RecordNotEvenLength => "odd number of hex digits".to_string(),
        ReaderError::ContainsInvalidCharacters => "non-hex character in record".to_string(),
        ReaderError::ChecksumMismatch(a, b) => {
            format!("checksum mismatch (0x{:02X} vs 0x{:02X})", a, b)
        }
        ReaderError::PayloadLengthMismatch => "byte count does not match the data".to_string(),
        ReaderError::UnsupportedRecordType(kind) => {
            format!("unsupported record type {:02X}", kind)
        }
        other => other.to_string(),
    };
    Error::malformed(line, reason)
}
