// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire grammar of the bootmon monitor.
//!
//! Every command is one ASCII letter followed by fixed-width uppercase hex
//! operands. Replies are `!`, an optional fixed number of hex digits, then
//! the `>` prompt:
//!
//! | command              | form              | reply            |
//! |----------------------|-------------------|------------------|
//! | connect probe        | `' '`             | `?` or `>`       |
//! | query vector         | `o`               | `!` hhhh `>`     |
//! | write program word   | `F` aaaa vvvv     | `!>`             |
//! | read program word    | `f` aaaa          | `!` hhhh `>`     |
//! | write EEPROM byte    | `E` aa vv         | `!>`             |
//! | read EEPROM byte     | `e` aa            | `!` hh `>`       |
//! | launch firmware      | `O`               | none             |

use heapless::Vec as HeaplessVec;

// --- Wire characters ---

pub const PROBE: u8 = b' ';
pub const PROMPT: u8 = b'>';
pub const UNKNOWN: u8 = b'?';
pub const ACK: u8 = b'!';

pub const CMD_QUERY_VECTOR: u8 = b'o';
pub const CMD_WRITE_PROGRAM: u8 = b'F';
pub const CMD_READ_PROGRAM: u8 = b'f';
pub const CMD_WRITE_EEPROM: u8 = b'E';
pub const CMD_READ_EEPROM: u8 = b'e';
pub const CMD_LAUNCH: u8 = b'O';

/// Longest encoded command (`F` + 4 + 4 digits).
pub const MAX_COMMAND_LEN: usize = 9;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Bytes the monitor may answer a probe with.
pub fn is_sync_ack(byte: u8) -> bool {
    byte == UNKNOWN || byte == PROMPT
}

/// Value of a hex digit, either case.
pub fn hex_nybble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

// --- Commands ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    QueryVector,
    WriteProgram { address: u16, value: u16 },
    ReadProgram { address: u16 },
    WriteEeprom { address: u8, value: u8 },
    ReadEeprom { address: u8 },
    Launch,
}

/// Shape of the reply a command expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Nothing comes back.
    None,
    /// `!>`
    Ack,
    /// `!`, this many hex digits, `>`
    Value { digits: usize },
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::QueryVector => CMD_QUERY_VECTOR,
            Command::WriteProgram { .. } => CMD_WRITE_PROGRAM,
            Command::ReadProgram { .. } => CMD_READ_PROGRAM,
            Command::WriteEeprom { .. } => CMD_WRITE_EEPROM,
            Command::ReadEeprom { .. } => CMD_READ_EEPROM,
            Command::Launch => CMD_LAUNCH,
        }
    }

    pub fn reply(&self) -> Reply {
        match self {
            Command::Launch => Reply::None,
            Command::WriteProgram { .. } | Command::WriteEeprom { .. } => Reply::Ack,
            Command::QueryVector | Command::ReadProgram { .. } => Reply::Value { digits: 4 },
            Command::ReadEeprom { .. } => Reply::Value { digits: 2 },
        }
    }

    /// Encode the command as sent on the wire.
    pub fn encode(&self) -> HeaplessVec<u8, MAX_COMMAND_LEN> {
        let mut out = HeaplessVec::new();
        let _ = out.push(self.opcode());
        match *self {
            Command::WriteProgram { address, value } => {
                push_hex(&mut out, u32::from(address), 4);
                push_hex(&mut out, u32::from(value), 4);
            }
            Command::ReadProgram { address } => push_hex(&mut out, u32::from(address), 4),
            Command::WriteEeprom { address, value } => {
                push_hex(&mut out, u32::from(address), 2);
                push_hex(&mut out, u32::from(value), 2);
            }
            Command::ReadEeprom { address } => push_hex(&mut out, u32::from(address), 2),
            Command::QueryVector | Command::Launch => {}
        }
        out
    }
}

fn push_hex(out: &mut HeaplessVec<u8, MAX_COMMAND_LEN>, value: u32, digits: usize) {
    for shift in (0..digits).rev() {
        let nybble = (value >> (shift * 4)) & 0xF;
        let _ = out.push(HEX_DIGITS[nybble as usize]);
    }
}
