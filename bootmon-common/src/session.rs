// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Connection state machine - pure logic without I/O.
//!
//! The monitor feeds events from its connect loop into [`transition`] so the
//! rules can be tested without a serial line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Rejected probes between two error reports.
pub const REJECT_REPORT_INTERVAL: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Synchronizing,
    Connected,
    Failed,
}

/// Things that happen while talking to the monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A probe was sent.
    Probe,
    /// The monitor answered with an accepted byte and went quiet.
    Acknowledged,
    /// The monitor answered with a byte outside the accepted set.
    Rejected,
    /// The user interrupted.
    Cancelled,
    /// The connect deadline passed.
    DeadlineExpired,
    /// The application was started; the monitor is gone.
    Launched,
}

/// Next connection state for an event.
pub fn transition(state: ConnectionState, event: SessionEvent) -> ConnectionState {
    use ConnectionState::*;

    match (state, event) {
        (_, SessionEvent::Cancelled) | (_, SessionEvent::DeadlineExpired) => Failed,
        (Connected, SessionEvent::Probe) => Connected,
        (_, SessionEvent::Probe) => Synchronizing,
        (Synchronizing, SessionEvent::Acknowledged) => Connected,
        (Synchronizing, SessionEvent::Rejected) => Synchronizing,
        (Connected, SessionEvent::Launched) => Disconnected,
        (state, _) => state,
    }
}

/// Whether the rejection count warrants an error report.
pub fn rejection_report_due(rejected: u32) -> bool {
    rejected > 0 && rejected % REJECT_REPORT_INTERVAL == 0
}

/// Cooperative cancellation flag shared with an interrupt handler.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
