// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Protocol engine for the bootmon monitor.
//!
//! [`Monitor`] owns the link for the whole session. It first synchronizes
//! with the monitor by probing with spaces, then runs one request/response
//! exchange at a time. Every reply byte is checked against the grammar in
//! [`crate::protocol`]; a reply that does not arrive within the reply
//! timeout is reported like a wrong byte, with no actual byte.

use std::time::Instant;

use crate::config::Timing;
use crate::error::{printable, Error, Expected, Result};
use crate::link::{Link, ReadMode};
use crate::memory_map::{MemoryLayout, ReadTarget, EEPROM_MAX_ADDR};
use crate::progress::Progress;
use crate::protocol::{self, Command, Reply, ACK, PROBE, PROMPT};
use crate::session::{self, CancelToken, ConnectionState, SessionEvent};

/// Longest answer to a single probe; a line that keeps talking is not a
/// monitor greeting.
pub const MAX_GREETING_LEN: usize = 64;

pub struct Monitor<L: Link> {
    link: L,
    state: ConnectionState,
    timing: Timing,
    layout: MemoryLayout,
    cancel: CancelToken,
}

impl<L: Link> Monitor<L> {
    pub fn new(link: L, timing: Timing, cancel: CancelToken) -> Self {
        Self {
            link,
            state: ConnectionState::Disconnected,
            timing,
            layout: MemoryLayout::default(),
            cancel,
        }
    }

    /// Use a non-default readback window for addressed reads.
    pub fn with_layout(mut self, layout: MemoryLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Give the link back, closing the session.
    pub fn into_link(self) -> L {
        self.link
    }

    fn apply(&mut self, event: SessionEvent) {
        let next = session::transition(self.state, event);
        if next != self.state {
            log::debug!("session {:?} -> {:?} ({:?})", self.state, next, event);
        }
        self.state = next;
    }

    /// Probe until the monitor answers.
    ///
    /// Silence and rejected bytes are retried; every hundredth rejection is
    /// passed to `progress` so a wrong baud rate does not go unnoticed. Stops
    /// with `Cancelled` when the cancel token is set and with
    /// `ConnectTimeout` once the configured deadline, if any, has passed.
    pub fn connect(&mut self, progress: &mut dyn Progress) -> Result<()> {
        let started = Instant::now();
        let mut probes: u32 = 0;
        let mut rejected: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                self.apply(SessionEvent::Cancelled);
                return Err(Error::Cancelled);
            }
            if let Some(deadline) = self.timing.connect_deadline {
                if started.elapsed() >= deadline {
                    self.apply(SessionEvent::DeadlineExpired);
                    return Err(Error::ConnectTimeout { attempts: probes });
                }
            }

            probes += 1;
            match self.probe() {
                Ok(true) => {
                    log::info!("Connected to monitor after {} probes", probes);
                    progress.connected();
                    return Ok(());
                }
                Ok(false) => {
                    rejected = 0;
                    progress.waiting();
                }
                Err(Error::BadConnection { byte }) => {
                    rejected += 1;
                    log::debug!("probe rejected with 0x{:02X}", byte);
                    if session::rejection_report_due(rejected) {
                        log::warn!(
                            "{} probes rejected, last reply {}; check the baud rate",
                            rejected,
                            printable(byte)
                        );
                        progress.rejected(rejected, byte);
                    }
                }
                Err(e) => {
                    self.state = ConnectionState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Send one probe.
    ///
    /// `Ok(false)` when nothing came back within the poll interval,
    /// `Ok(true)` once an accepted byte arrived and the line went quiet,
    /// `BadConnection` for any other byte or a greeting longer than
    /// [`MAX_GREETING_LEN`]. The cancel token is checked while draining.
    /// Probing an already connected session leaves it connected.
    pub fn probe(&mut self) -> Result<bool> {
        self.apply(SessionEvent::Probe);
        self.link.write(&[PROBE])?;

        let poll = ReadMode::Blocking(self.timing.poll_interval);
        let Some(first) = self.link.read_byte(poll)? else {
            return Ok(false);
        };
        self.check_sync_byte(first)?;

        // Drain the rest of the greeting until the line is quiet
        let mut drained = 1;
        loop {
            if self.cancel.is_cancelled() {
                self.apply(SessionEvent::Cancelled);
                return Err(Error::Cancelled);
            }
            let byte = match self.link.read_byte(ReadMode::NonBlocking)? {
                Some(byte) => byte,
                None => match self.link.read_byte(poll)? {
                    Some(byte) => byte,
                    None => break,
                },
            };
            drained += 1;
            if drained > MAX_GREETING_LEN {
                log::debug!("greeting exceeds {} bytes", MAX_GREETING_LEN);
                self.apply(SessionEvent::Rejected);
                return Err(Error::BadConnection { byte });
            }
            self.check_sync_byte(byte)?;
        }

        self.apply(SessionEvent::Acknowledged);
        Ok(true)
    }

    fn check_sync_byte(&mut self, byte: u8) -> Result<()> {
        log::trace!("<- sync 0x{:02X}", byte);
        if protocol::is_sync_ack(byte) {
            Ok(())
        } else {
            self.apply(SessionEvent::Rejected);
            Err(Error::BadConnection { byte })
        }
    }

    /// Ask the monitor where the application's reset vector belongs.
    pub fn query_vector(&mut self) -> Result<u16> {
        let vector = self.exchange(Command::QueryVector)?;
        log::info!("Monitor boot vector at 0x{:04X}", vector);
        Ok(vector)
    }

    /// Write one program word.
    pub fn write_program(&mut self, address: u16, value: u16) -> Result<()> {
        self.exchange(Command::WriteProgram { address, value })
            .map(|_| ())
    }

    /// Read one program word.
    pub fn read_program(&mut self, address: u16) -> Result<u16> {
        self.exchange(Command::ReadProgram { address })
    }

    /// Write one EEPROM byte. Addresses above `0xFF` are refused before
    /// anything is sent.
    pub fn write_eeprom(&mut self, address: u16, value: u8) -> Result<()> {
        let address = eeprom_address(address)?;
        self.exchange(Command::WriteEeprom { address, value })
            .map(|_| ())
    }

    /// Read one EEPROM byte. Same address bound as [`Monitor::write_eeprom`].
    pub fn read_eeprom(&mut self, address: u16) -> Result<u8> {
        let address = eeprom_address(address)?;
        self.exchange(Command::ReadEeprom { address })
            .map(|value| value as u8)
    }

    /// Read any location: program memory below the readback window, EEPROM
    /// inside it.
    pub fn read(&mut self, address: u16) -> Result<u16> {
        match self.layout.read_target(address) {
            Some(ReadTarget::Program(addr)) => self.read_program(addr),
            Some(ReadTarget::Eeprom(addr)) => self.read_eeprom(u16::from(addr)).map(u16::from),
            None => Err(Error::InvalidAddress(address)),
        }
    }

    /// Start the application. The monitor leaves immediately and never
    /// answers, so the session is over afterwards.
    pub fn launch(&mut self) -> Result<()> {
        self.exchange(Command::Launch)?;
        self.apply(SessionEvent::Launched);
        log::info!("Application launched");
        Ok(())
    }

    /// Send a command and collect its reply value (0 when it has none).
    fn exchange(&mut self, command: Command) -> Result<u16> {
        if self.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        let encoded = command.encode();
        log::trace!("-> {}", String::from_utf8_lossy(&encoded));
        self.link.write(&encoded)?;

        let opcode = command.opcode();
        match command.reply() {
            Reply::None => Ok(0),
            Reply::Ack => {
                self.expect(opcode, ACK)?;
                self.expect(opcode, PROMPT)?;
                Ok(0)
            }
            Reply::Value { digits } => {
                self.expect(opcode, ACK)?;
                let mut value: u16 = 0;
                for _ in 0..digits {
                    let byte = self.reply_byte()?;
                    match byte.and_then(protocol::hex_nybble) {
                        Some(nybble) => value = (value << 4) | u16::from(nybble),
                        None => {
                            return Err(Error::Protocol {
                                command: opcode,
                                expected: Expected::HexDigit,
                                actual: byte,
                            })
                        }
                    }
                }
                self.expect(opcode, PROMPT)?;
                Ok(value)
            }
        }
    }

    fn expect(&mut self, command: u8, wanted: u8) -> Result<()> {
        match self.reply_byte()? {
            Some(byte) if byte == wanted => Ok(()),
            actual => Err(Error::Protocol {
                command,
                expected: Expected::Byte(wanted),
                actual,
            }),
        }
    }

    fn reply_byte(&mut self) -> Result<Option<u8>> {
        let byte = self
            .link
            .read_byte(ReadMode::Blocking(self.timing.reply_timeout))?;
        if let Some(b) = byte {
            log::trace!("<- 0x{:02X}", b);
        }
        Ok(byte)
    }
}

fn eeprom_address(address: u16) -> Result<u8> {
    if address > EEPROM_MAX_ADDR {
        return Err(Error::InvalidAddress(address));
    }
    Ok(address as u8)
}
