// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Download and upload operations.
//!
//! Both run over an already connected [`Monitor`]. Nothing is rolled back:
//! a download that fails or is cancelled part way leaves whatever was
//! already written on the device.

use std::ops::Range;

use crate::config::{SessionConfig, VectorPolicy};
use crate::error::{Error, Result};
use crate::hexfile::MemoryImage;
use crate::link::Link;
use crate::memory_map::{AddressClass, MemoryLayout, VectorMap, RESET_WORDS};
use crate::monitor::Monitor;
use crate::progress::{self, Phase, Progress};

/// One write a download will issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannedWrite {
    Program { address: u16, value: u16 },
    Eeprom { address: u8, value: u8 },
}

/// Writes derived from an image for a given vector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    pub writes: Vec<PlannedWrite>,
    /// Image words left out (configuration, reserved or monitor space).
    pub skipped: usize,
}

/// Summary of a finished download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadReport {
    pub vector: u16,
    pub program_words: usize,
    pub eeprom_bytes: usize,
    pub skipped: usize,
    pub verified: bool,
    pub launched: bool,
}

/// Start sequence jumping to `origin`: movlw high(origin), movwf PCLATH,
/// goto origin, padded to a full block.
pub fn entry_trampoline(origin: u16) -> [u16; RESET_WORDS as usize] {
    [0x3000 | (origin >> 8), 0x008A, 0x2800 | (origin & 0x07FF), 0x0000]
}

/// Decide which image words are written where.
///
/// The image's reset words are moved onto the vector block. Words the image
/// itself places in the vector block are only kept when it has no reset
/// words to relocate.
pub fn plan_download(image: &MemoryImage, map: &VectorMap, policy: VectorPolicy) -> DownloadPlan {
    let mut plan = DownloadPlan::default();
    let has_reset = (0..RESET_WORDS).any(|addr| image.contains(addr));

    if let VectorPolicy::Trampoline { origin } = policy {
        for (address, value) in map.vector_block().zip(entry_trampoline(origin)) {
            plan.writes.push(PlannedWrite::Program { address, value });
        }
    }

    for word in image.iter() {
        match map.classify(word.address) {
            AddressClass::Program => plan.writes.push(PlannedWrite::Program {
                address: word.address,
                value: word.value,
            }),
            AddressClass::ResetVector { target } => match policy {
                VectorPolicy::Relocate => {
                    log::debug!(
                        "relocating reset word 0x{:04X} to 0x{:04X}",
                        word.address,
                        target
                    );
                    plan.writes.push(PlannedWrite::Program {
                        address: target,
                        value: word.value,
                    });
                }
                VectorPolicy::Trampoline { .. } => plan.skipped += 1,
            },
            AddressClass::VectorBlock => {
                if policy == VectorPolicy::Relocate && !has_reset {
                    plan.writes.push(PlannedWrite::Program {
                        address: word.address,
                        value: word.value,
                    });
                } else {
                    log::warn!(
                        "skipping 0x{:04X}: vector block is taken by the relocated reset vector",
                        word.address
                    );
                    plan.skipped += 1;
                }
            }
            AddressClass::Eeprom { offset } => plan.writes.push(PlannedWrite::Eeprom {
                address: offset,
                value: word.value as u8,
            }),
            AddressClass::Config | AddressClass::Invalid => {
                log::debug!("skipping 0x{:04X}", word.address);
                plan.skipped += 1;
            }
        }
    }

    plan
}

/// Write `image` to the device, then optionally verify and launch it.
pub fn download<L: Link>(
    monitor: &mut Monitor<L>,
    image: &MemoryImage,
    config: &SessionConfig,
    progress: &mut dyn Progress,
) -> Result<DownloadReport> {
    let vector = monitor.query_vector()?;
    let map = VectorMap::new(vector, config.layout.clone());
    let plan = plan_download(image, &map, config.vector_policy);

    log::info!(
        "Writing {} words ({} skipped)",
        plan.writes.len(),
        plan.skipped
    );
    progress.begin(Phase::Download, plan.writes.len());

    let mut done = 0;
    for write in &plan.writes {
        let result = monitor
            .cancel_token()
            .check()
            .and_then(|_| apply_write(monitor, write));
        if let Err(e) = result {
            progress.finish(done);
            if done > 0 {
                log::warn!(
                    "Download stopped after {} of {} words; the device holds a partial image",
                    done,
                    plan.writes.len()
                );
            }
            return Err(e);
        }
        done += 1;
        progress::report(progress, done);
    }
    progress.finish(done);

    if config.verify {
        verify(monitor, &plan, progress)?;
    }
    if config.launch {
        monitor.launch()?;
    }

    let eeprom_bytes = plan
        .writes
        .iter()
        .filter(|w| matches!(w, PlannedWrite::Eeprom { .. }))
        .count();
    Ok(DownloadReport {
        vector,
        program_words: plan.writes.len() - eeprom_bytes,
        eeprom_bytes,
        skipped: plan.skipped,
        verified: config.verify,
        launched: config.launch,
    })
}

fn apply_write<L: Link>(monitor: &mut Monitor<L>, write: &PlannedWrite) -> Result<()> {
    match *write {
        PlannedWrite::Program { address, value } => monitor.write_program(address, value),
        PlannedWrite::Eeprom { address, value } => {
            monitor.write_eeprom(u16::from(address), value)
        }
    }
}

/// Read back every planned write and compare.
pub fn verify<L: Link>(
    monitor: &mut Monitor<L>,
    plan: &DownloadPlan,
    progress: &mut dyn Progress,
) -> Result<()> {
    progress.begin(Phase::Verify, plan.writes.len());

    for (index, write) in plan.writes.iter().enumerate() {
        monitor.cancel_token().check()?;
        let (address, expected, actual) = match *write {
            PlannedWrite::Program { address, value } => {
                (address, value, monitor.read_program(address)?)
            }
            PlannedWrite::Eeprom { address, value } => (
                u16::from(address),
                u16::from(value),
                u16::from(monitor.read_eeprom(u16::from(address))?),
            ),
        };
        if actual != expected {
            progress.finish(index);
            return Err(Error::VerifyMismatch {
                address,
                expected,
                actual,
            });
        }
        progress::report(progress, index + 1);
    }

    progress.finish(plan.writes.len());
    log::info!("Verified {} words", plan.writes.len());
    Ok(())
}

/// Word windows an upload reads: program memory, then the EEPROM readback.
pub fn upload_windows(image_size: u16, layout: &MemoryLayout) -> [Range<u16>; 2] {
    [0..image_size, layout.readback.clone()]
}

/// Read the device back into an image.
pub fn upload<L: Link>(
    monitor: &mut Monitor<L>,
    image_size: u16,
    progress: &mut dyn Progress,
) -> Result<MemoryImage> {
    let windows = upload_windows(image_size, monitor.layout());
    let total: usize = windows.iter().map(|w| w.len()).sum();
    progress.begin(Phase::Upload, total);

    let mut image = MemoryImage::new();
    let mut done = 0;
    for window in windows {
        for address in window {
            if let Err(e) = monitor.cancel_token().check() {
                progress.finish(done);
                return Err(e);
            }
            let value = monitor.read(address)?;
            image.insert(address, value);
            done += 1;
            progress::report(progress, done);
        }
    }
    progress.finish(done);

    log::info!("Read {} words", done);
    Ok(image)
}

/// Render an uploaded image over the windows it was read from.
pub fn render_upload(
    image: &MemoryImage,
    image_size: u16,
    layout: &MemoryLayout,
) -> Result<String> {
    image.render(&upload_windows(image_size, layout))
}
