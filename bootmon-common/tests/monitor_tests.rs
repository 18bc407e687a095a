// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the protocol engine against scripted and emulated monitors.

mod common;

use std::time::Duration;

use bootmon_common::monitor::MAX_GREETING_LEN;
use bootmon_common::{CancelToken, ConnectionState, Error, Expected, Monitor};

use common::{
    connected_fake, connected_scripted, fast_timing, ChattyLink, FakeMonitor, RecordingProgress,
    ScriptedLink,
};

// =============================================================================
// Connect
// =============================================================================

#[test]
fn test_connect_drains_greeting() {
    let mut monitor = Monitor::new(FakeMonitor::new(0xE34), fast_timing(), CancelToken::new());
    let mut progress = RecordingProgress::default();

    assert_eq!(monitor.state(), ConnectionState::Disconnected);
    monitor.connect(&mut progress).unwrap();

    assert_eq!(monitor.state(), ConnectionState::Connected);
    assert!(progress.connected);
    assert_eq!(monitor.link().probes(), 1);
}

#[test]
fn test_connect_waits_through_silence() {
    let mut fake = FakeMonitor::new(0xE34);
    fake.silent_probes = 5;
    let mut monitor = Monitor::new(fake, fast_timing(), CancelToken::new());
    let mut progress = RecordingProgress::default();

    monitor.connect(&mut progress).unwrap();

    assert_eq!(progress.waiting, 5);
    assert_eq!(monitor.link().probes(), 6);
}

#[test]
fn test_connect_reports_every_hundred_rejections() {
    let mut fake = FakeMonitor::new(0xE34);
    fake.garbled_probes = 250;
    let mut monitor = Monitor::new(fake, fast_timing(), CancelToken::new());
    let mut progress = RecordingProgress::default();

    monitor.connect(&mut progress).unwrap();

    assert_eq!(progress.rejected, vec![(100, 0x86), (200, 0x86)]);
    assert_eq!(monitor.state(), ConnectionState::Connected);
}

#[test]
fn test_probe_rejects_unexpected_byte() {
    let mut monitor = Monitor::new(
        ScriptedLink::new(&[b"U"]),
        fast_timing(),
        CancelToken::new(),
    );
    match monitor.probe() {
        Err(Error::BadConnection { byte }) => assert_eq!(byte, b'U'),
        other => panic!("expected BadConnection, got {:?}", other),
    }
    assert_eq!(monitor.state(), ConnectionState::Synchronizing);
}

#[test]
fn test_probe_rejects_garbage_after_accepted_byte() {
    let mut monitor = Monitor::new(
        ScriptedLink::new(&[b"?x"]),
        fast_timing(),
        CancelToken::new(),
    );
    assert!(matches!(
        monitor.probe(),
        Err(Error::BadConnection { byte: b'x' })
    ));
}

#[test]
fn test_probe_silence_is_not_an_error() {
    let mut monitor = Monitor::new(ScriptedLink::new(&[]), fast_timing(), CancelToken::new());
    assert!(!monitor.probe().unwrap());
    assert_eq!(monitor.state(), ConnectionState::Synchronizing);
}

#[test]
fn test_connect_cancelled_is_distinct() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut monitor = Monitor::new(FakeMonitor::new(0xE34), fast_timing(), cancel);

    let result = monitor.connect(&mut RecordingProgress::default());

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(monitor.state(), ConnectionState::Failed);
    assert_eq!(monitor.link().probes(), 0);
}

#[test]
fn test_connect_deadline() {
    let mut timing = fast_timing();
    timing.connect_deadline = Some(Duration::ZERO);
    let mut monitor = Monitor::new(FakeMonitor::new(0xE34), timing, CancelToken::new());

    let result = monitor.connect(&mut RecordingProgress::default());

    assert!(matches!(result, Err(Error::ConnectTimeout { .. })));
    assert_eq!(monitor.state(), ConnectionState::Failed);
}

#[test]
fn test_endless_greeting_is_rejected() {
    let mut monitor = Monitor::new(ChattyLink::new(b'>'), fast_timing(), CancelToken::new());

    assert!(matches!(
        monitor.probe(),
        Err(Error::BadConnection { byte: b'>' })
    ));
    assert_eq!(monitor.link().reads, MAX_GREETING_LEN + 1);
    assert_eq!(monitor.state(), ConnectionState::Synchronizing);
}

#[test]
fn test_cancel_observed_while_draining_greeting() {
    let cancel = CancelToken::new();
    let mut link = ChattyLink::new(b'>');
    link.cancel_after = Some((5, cancel.clone()));
    let mut timing = fast_timing();
    timing.connect_deadline = Some(Duration::from_millis(50));
    let mut monitor = Monitor::new(link, timing, cancel);

    let result = monitor.connect(&mut RecordingProgress::default());

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(monitor.state(), ConnectionState::Failed);
    assert!(monitor.link().reads < MAX_GREETING_LEN);
}

#[test]
fn test_deadline_stops_endless_greeting() {
    let mut timing = fast_timing();
    timing.connect_deadline = Some(Duration::from_millis(20));
    let mut monitor = Monitor::new(ChattyLink::new(b'?'), timing, CancelToken::new());

    let result = monitor.connect(&mut RecordingProgress::default());

    assert!(matches!(result, Err(Error::ConnectTimeout { .. })));
    assert_eq!(monitor.state(), ConnectionState::Failed);
}

#[test]
fn test_probe_on_connected_session_stays_connected() {
    let mut monitor = connected_scripted(&[]);
    assert!(!monitor.probe().unwrap());
    assert_eq!(monitor.state(), ConnectionState::Connected);
}

#[test]
fn test_commands_require_connection() {
    let mut monitor = Monitor::new(FakeMonitor::new(0xE34), fast_timing(), CancelToken::new());
    assert!(matches!(monitor.query_vector(), Err(Error::NotConnected)));
    assert!(monitor.link().tx.is_empty());
}

// =============================================================================
// Program memory
// =============================================================================

#[test]
fn test_write_program_acknowledged() {
    let mut monitor = connected_scripted(&[b"!>"]);
    monitor.write_program(0x0010, 0xABCD).unwrap();
    assert_eq!(&monitor.link().tx[1..], b"F0010ABCD");
}

#[test]
fn test_write_program_bad_prompt() {
    let mut monitor = connected_scripted(&[b"!X"]);
    match monitor.write_program(0x0010, 0xABCD) {
        Err(Error::Protocol {
            command,
            expected,
            actual,
        }) => {
            assert_eq!(command, b'F');
            assert_eq!(expected, Expected::Byte(b'>'));
            assert_eq!(actual, Some(b'X'));
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_write_program_missing_ack() {
    let mut monitor = connected_scripted(&[b"?"]);
    assert!(matches!(
        monitor.write_program(0, 0),
        Err(Error::Protocol {
            expected: Expected::Byte(b'!'),
            actual: Some(b'?'),
            ..
        })
    ));
}

#[test]
fn test_reply_timeout_is_protocol_error() {
    let mut monitor = connected_scripted(&[b"!"]);
    assert!(matches!(
        monitor.write_program(0, 0),
        Err(Error::Protocol {
            expected: Expected::Byte(b'>'),
            actual: None,
            ..
        })
    ));
}

#[test]
fn test_read_program_case_insensitive() {
    let mut monitor = connected_scripted(&[b"!3fAb>"]);
    assert_eq!(monitor.read_program(0x0123).unwrap(), 0x3FAB);
    assert_eq!(&monitor.link().tx[1..], b"f0123");
}

#[test]
fn test_read_program_non_hex_digit() {
    let mut monitor = connected_scripted(&[b"!12>4>"]);
    assert!(matches!(
        monitor.read_program(0),
        Err(Error::Protocol {
            command: b'f',
            expected: Expected::HexDigit,
            actual: Some(b'>'),
        })
    ));
}

#[test]
fn test_read_program_missing_prompt() {
    let mut monitor = connected_scripted(&[b"!1234!"]);
    assert!(matches!(
        monitor.read_program(0),
        Err(Error::Protocol {
            expected: Expected::Byte(b'>'),
            actual: Some(b'!'),
            ..
        })
    ));
}

#[test]
fn test_query_vector() {
    let mut monitor = connected_scripted(&[b"!0E34>"]);
    assert_eq!(monitor.query_vector().unwrap(), 0x0E34);
    assert_eq!(&monitor.link().tx[1..], b"o");
}

// =============================================================================
// EEPROM
// =============================================================================

#[test]
fn test_eeprom_write_and_read() {
    let mut monitor = connected_fake(FakeMonitor::new(0xE34));
    monitor.write_eeprom(0x0F, 0xA5).unwrap();
    assert_eq!(monitor.read_eeprom(0x0F).unwrap(), 0xA5);
    assert_eq!(monitor.link().commands, vec!["E0FA5", "e0F"]);
}

#[test]
fn test_eeprom_address_bound_checked_before_sending() {
    let mut monitor = connected_scripted(&[]);
    let sent = monitor.link().tx.len();

    assert!(matches!(
        monitor.read_eeprom(0x100),
        Err(Error::InvalidAddress(0x100))
    ));
    assert!(matches!(
        monitor.write_eeprom(0x100, 0),
        Err(Error::InvalidAddress(0x100))
    ));
    assert_eq!(monitor.link().tx.len(), sent);
}

// =============================================================================
// Addressed reads and launch
// =============================================================================

#[test]
fn test_addressed_read_dispatch() {
    let mut fake = FakeMonitor::new(0xE34);
    fake.program.insert(0x1FFF, 0x1234);
    fake.eeprom[0x05] = 0xAB;
    let mut monitor = connected_fake(fake);

    assert_eq!(monitor.read(0x1FFF).unwrap(), 0x1234);
    assert_eq!(monitor.read(0x2005).unwrap(), 0x00AB);
    assert_eq!(monitor.link().commands, vec!["f1FFF", "e05"]);
}

#[test]
fn test_addressed_read_outside_windows() {
    let mut monitor = connected_fake(FakeMonitor::new(0xE34));
    assert!(matches!(
        monitor.read(0x2100),
        Err(Error::InvalidAddress(0x2100))
    ));
    assert!(monitor.link().commands.is_empty());
}

#[test]
fn test_launch_ends_session() {
    let mut monitor = connected_fake(FakeMonitor::new(0xE34));
    monitor.launch().unwrap();

    assert!(monitor.link().launched);
    assert_eq!(monitor.state(), ConnectionState::Disconnected);
    assert!(matches!(
        monitor.read_program(0),
        Err(Error::NotConnected)
    ));
}

#[test]
fn test_into_link_returns_transport() {
    let monitor = connected_fake(FakeMonitor::new(0xE34));
    let fake = monitor.into_link();
    assert_eq!(fake.probes(), 1);
}
