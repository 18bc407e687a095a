// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory links for exercising the protocol engine.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use bootmon_common::config::Timing;
use bootmon_common::progress::Phase;
use bootmon_common::{CancelToken, Link, Monitor, Progress, ReadMode, Result, Tick};

/// Timing that keeps tests fast; the fakes never block anyway.
pub fn fast_timing() -> Timing {
    Timing {
        poll_interval: Duration::from_millis(1),
        reply_timeout: Duration::from_millis(1),
        connect_deadline: None,
    }
}

// =============================================================================
// FakeMonitor: emulates the monitor's grammar
// =============================================================================

pub struct FakeMonitor {
    pub program: BTreeMap<u16, u16>,
    pub eeprom: [u8; 256],
    pub vector: u16,
    /// Probes left unanswered before the monitor wakes up.
    pub silent_probes: usize,
    /// Probes answered with `garbage` before the monitor answers properly.
    pub garbled_probes: usize,
    pub garbage: u8,
    /// Reply to an accepted probe.
    pub greeting: Vec<u8>,
    pub launched: bool,
    /// Commands received, as sent on the wire.
    pub commands: Vec<String>,
    pub tx: Vec<u8>,
    rx: VecDeque<u8>,
    pending: Vec<u8>,
}

impl FakeMonitor {
    pub fn new(vector: u16) -> Self {
        Self {
            program: BTreeMap::new(),
            eeprom: [0xFF; 256],
            vector,
            silent_probes: 0,
            garbled_probes: 0,
            garbage: 0x86,
            greeting: b"?>".to_vec(),
            launched: false,
            commands: Vec::new(),
            tx: Vec::new(),
            rx: VecDeque::new(),
            pending: Vec::new(),
        }
    }

    pub fn probes(&self) -> usize {
        self.tx.iter().filter(|&&b| b == b' ').count()
    }

    fn reply(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    fn feed(&mut self, byte: u8) {
        if self.pending.is_empty() {
            match byte {
                b' ' => self.answer_probe(),
                b'o' => {
                    self.commands.push("o".to_string());
                    let reply = format!("!{:04X}>", self.vector);
                    self.reply(reply.as_bytes());
                }
                b'O' => {
                    self.commands.push("O".to_string());
                    self.launched = true;
                }
                b'F' | b'f' | b'E' | b'e' => self.pending.push(byte),
                _ => self.reply(b"?"),
            }
            return;
        }

        self.pending.push(byte);
        let needed = match self.pending[0] {
            b'F' => 9,
            b'f' | b'E' => 5,
            _ => 3,
        };
        if self.pending.len() == needed {
            let command = std::mem::take(&mut self.pending);
            self.execute(&command);
        }
    }

    fn answer_probe(&mut self) {
        if self.silent_probes > 0 {
            self.silent_probes -= 1;
        } else if self.garbled_probes > 0 {
            self.garbled_probes -= 1;
            let garbage = self.garbage;
            self.reply(&[garbage]);
        } else {
            let greeting = self.greeting.clone();
            self.reply(&greeting);
        }
    }

    fn execute(&mut self, command: &[u8]) {
        let text = String::from_utf8_lossy(command).to_string();
        let field = |range: std::ops::Range<usize>| {
            u16::from_str_radix(&text[range], 16).expect("fake monitor got bad hex")
        };

        match command[0] {
            b'F' => {
                self.program.insert(field(1..5), field(5..9));
                self.reply(b"!>");
            }
            b'f' => {
                let value = self.program.get(&field(1..5)).copied().unwrap_or(0x3FFF);
                self.reply(format!("!{:04X}>", value).as_bytes());
            }
            b'E' => {
                self.eeprom[field(1..3) as usize] = field(3..5) as u8;
                self.reply(b"!>");
            }
            _ => {
                let value = self.eeprom[field(1..3) as usize];
                self.reply(format!("!{:02X}>", value).as_bytes());
            }
        }
        self.commands.push(text);
    }
}

impl Link for FakeMonitor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.tx.push(byte);
            self.feed(byte);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _mode: ReadMode) -> Result<usize> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

// =============================================================================
// ScriptedLink: canned replies, one chunk per write
// =============================================================================

pub struct ScriptedLink {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl ScriptedLink {
    /// Each write releases the next reply chunk.
    pub fn new(replies: &[&[u8]]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_vec()).collect(),
            rx: VecDeque::new(),
            tx: Vec::new(),
        }
    }
}

impl Link for ScriptedLink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.tx.extend_from_slice(data);
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _mode: ReadMode) -> Result<usize> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

// =============================================================================
// ChattyLink: a line that never goes quiet
// =============================================================================

pub struct ChattyLink {
    pub byte: u8,
    pub reads: usize,
    /// Cancelled once this many reads have been served.
    pub cancel_after: Option<(usize, CancelToken)>,
}

impl ChattyLink {
    pub fn new(byte: u8) -> Self {
        Self {
            byte,
            reads: 0,
            cancel_after: None,
        }
    }
}

impl Link for ChattyLink {
    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _mode: ReadMode) -> Result<usize> {
        self.reads += 1;
        if let Some((limit, token)) = &self.cancel_after {
            if self.reads >= *limit {
                token.cancel();
            }
        }
        match buf.first_mut() {
            Some(slot) => {
                *slot = self.byte;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// A monitor over a scripted link that has already answered the handshake
/// with `>`. `replies` follow, one per command.
pub fn connected_scripted(replies: &[&[u8]]) -> Monitor<ScriptedLink> {
    let mut script: Vec<&[u8]> = vec![b">".as_slice()];
    script.extend_from_slice(replies);
    let mut monitor = Monitor::new(ScriptedLink::new(&script), fast_timing(), CancelToken::new());
    monitor
        .connect(&mut RecordingProgress::default())
        .expect("scripted handshake");
    monitor
}

pub fn connected_fake(fake: FakeMonitor) -> Monitor<FakeMonitor> {
    let mut monitor = Monitor::new(fake, fast_timing(), CancelToken::new());
    monitor
        .connect(&mut RecordingProgress::default())
        .expect("fake handshake");
    monitor
}

// =============================================================================
// RecordingProgress
// =============================================================================

#[derive(Default)]
pub struct RecordingProgress {
    pub waiting: usize,
    pub rejected: Vec<(u32, u8)>,
    pub connected: bool,
    pub phases: Vec<(Phase, usize)>,
    pub ticks: Vec<(usize, Tick)>,
    pub finished: Vec<usize>,
    /// Cancelled as soon as a transfer begins.
    pub cancel_on_begin: Option<CancelToken>,
}

impl Progress for RecordingProgress {
    fn waiting(&mut self) {
        self.waiting += 1;
    }

    fn rejected(&mut self, attempts: u32, byte: u8) {
        self.rejected.push((attempts, byte));
    }

    fn connected(&mut self) {
        self.connected = true;
    }

    fn begin(&mut self, phase: Phase, total: usize) {
        self.phases.push((phase, total));
        if let Some(token) = &self.cancel_on_begin {
            token.cancel();
        }
    }

    fn advance(&mut self, done: usize, tick: Tick) {
        self.ticks.push((done, tick));
    }

    fn finish(&mut self, done: usize) {
        self.finished.push(done);
    }
}
