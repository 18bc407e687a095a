// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Progress reporting hooks.
//!
//! The core never prints. Whatever the user sees is decided by the
//! [`Progress`] implementation the caller passes in; [`Silent`] shows nothing.

/// Word-count cadence of transfer feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Every 16 words.
    Minor,
    /// Every 256 words.
    Major,
    /// Every 1024 words, with the count in units of 1024.
    Line { kilowords: usize },
}

/// The tick, if any, reached after `count` words.
pub fn tick_for(count: usize) -> Option<Tick> {
    if count == 0 || count % 16 != 0 {
        None
    } else if count % 1024 == 0 {
        Some(Tick::Line {
            kilowords: count / 1024,
        })
    } else if count % 256 == 0 {
        Some(Tick::Major)
    } else {
        Some(Tick::Minor)
    }
}

/// Which transfer a progress report belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Download,
    Verify,
    Upload,
}

/// Receiver for connect and transfer feedback.
pub trait Progress {
    /// A probe went unanswered.
    fn waiting(&mut self) {}

    /// Every hundredth rejected probe, with the last offending byte.
    fn rejected(&mut self, _attempts: u32, _byte: u8) {}

    /// The handshake completed.
    fn connected(&mut self) {}

    /// A transfer of `total` words starts.
    fn begin(&mut self, _phase: Phase, _total: usize) {}

    /// `done` words transferred, reported on every tick.
    fn advance(&mut self, _done: usize, _tick: Tick) {}

    /// The transfer ended after `done` words.
    fn finish(&mut self, _done: usize) {}
}

/// Reporter for quiet mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl Progress for Silent {}

impl<P: Progress + ?Sized> Progress for &mut P {
    fn waiting(&mut self) {
        (**self).waiting()
    }

    fn rejected(&mut self, attempts: u32, byte: u8) {
        (**self).rejected(attempts, byte)
    }

    fn connected(&mut self) {
        (**self).connected()
    }

    fn begin(&mut self, phase: Phase, total: usize) {
        (**self).begin(phase, total)
    }

    fn advance(&mut self, done: usize, tick: Tick) {
        (**self).advance(done, tick)
    }

    fn finish(&mut self, done: usize) {
        (**self).finish(done)
    }
}

/// Forward `count` to the reporter if it lands on a tick.
pub(crate) fn report(progress: &mut dyn Progress, count: usize) {
    if let Some(tick) = tick_for(count) {
        progress.advance(count, tick);
    }
}
