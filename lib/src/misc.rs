// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Working session over the misc partition.
//!
//! A [`Misc`] loads the envelope once, lets the caller inspect and edit the bootloader message
//! and the A/B control record, and writes the result back on [`Misc::commit`]. Nothing is written
//! when the edits left both records unchanged.


use crate::board::{BoardMirror, SlotMark};
use crate::device::{Device, RawDevice};
use crate::error::{Error, Result};
use crate::record::control::{ControlRecord, Slot};
use crate::record::message::MessageRecord;
use crate::record::{Envelope, Section};
use crate::store::{DirectStore, RedundantStore};
use std::path::Path;

/// Session settings.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Offset of the envelope on each device.
    pub offset: u64,
    /// Write both copies on commit instead of only the stale one.
    pub sync: bool,
    /// Allow writes when a single device is used.
    pub allow_direct_write: bool,
}

enum Backend<D> {
    Redundant(RedundantStore<D>),
    Direct(DirectStore<D>),
}

pub struct Misc<D = Device> {
    backend: Backend<D>,
    envelope: Envelope,
    sync: bool,
    /// Section CRCs of the envelope as loaded, used to skip needless writes.
    loaded: [u32; 2],
    mirror: Option<Box<dyn BoardMirror>>,
}

impl Misc<Device> {
    /// Opens one device (direct mode) or two devices (redundant mode) and loads the envelope.
    pub fn open<P: AsRef<Path>>(paths: &[P], options: &Options) -> Result<Self> {
        if !(1..=2).contains(&paths.len()) {
            log::error!("Expected one or two devices, got {}", paths.len());
            return Err(Error::DeviceCount(paths.len()));
        }

        let devices = paths
            .iter()
            .map(|path| Device::open(path))
            .collect::<Result<Vec<_>>>()?;
        Self::from_devices(devices, options)
    }
}

impl<D: RawDevice> Misc<D> {
    pub fn from_devices(devices: Vec<D>, options: &Options) -> Result<Self> {
        let count = devices.len();
        let mut devices = devices.into_iter();

        let (backend, envelope) = match (devices.next(), devices.next(), devices.next()) {
            (Some(primary), Some(secondary), None) => {
                let mut store = RedundantStore::new(primary, secondary, options.offset);
                let envelope = store.load()?;
                (Backend::Redundant(store), envelope)
            }
            (Some(device), None, None) => {
                let mut store =
                    DirectStore::new(device, options.offset, options.allow_direct_write);
                let envelope = store.load()?;
                (Backend::Direct(store), envelope)
            }
            _ => {
                log::error!("Expected one or two devices, got {count}");
                return Err(Error::DeviceCount(count));
            }
        };

        Ok(Self {
            backend,
            loaded: Section::ALL.map(|section| envelope.section_crc(section)),
            envelope,
            sync: options.sync,
            mirror: None,
        })
    }

    /// Forwards every slot mark to `mirror` as well.
    pub fn with_mirror(mut self, mirror: Box<dyn BoardMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn is_redundant(&self) -> bool {
        matches!(self.backend, Backend::Redundant(_))
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn message(&self) -> &MessageRecord {
        &self.envelope.message
    }

    pub fn message_mut(&mut self) -> &mut MessageRecord {
        &mut self.envelope.message
    }

    /// Validated A/B control record.
    pub fn control(&self) -> Result<ControlRecord> {
        self.envelope.control_record()
    }

    /// Applies `f` to the control record and stores it back with a fresh CRC.
    ///
    /// The record is left untouched when `f` fails.
    pub fn update_control<T>(
        &mut self,
        f: impl FnOnce(&mut ControlRecord) -> Result<T>,
    ) -> Result<T> {
        let mut record = self.control()?;
        let value = f(&mut record)?;
        record.seal_crc();
        self.envelope.set_control_record(&record);
        Ok(value)
    }

    /// Replaces the control record with the default layout.
    pub fn generate_default(&mut self) {
        log::info!("Generating default A/B metadata");
        self.envelope
            .set_control_record(&ControlRecord::default_layout());
    }

    pub fn active_slot(&self) -> Result<Slot> {
        self.control()?.active_slot()
    }

    /// Applies `mark` to `slot`, then reports it to the board mirror, if any.
    ///
    /// Mirror failures are logged only: the control record stays the reference.
    pub fn mark(&mut self, mark: SlotMark, slot: Slot) -> Result<()> {
        self.update_control(|record| record.apply_mark(mark, slot))?;

        if let Some(mirror) = self.mirror.as_mut()
            && let Err(err) = mirror.mark(mark, slot)
        {
            log::warn!("Failed to mirror slot {slot} marked as {mark}: {err}");
        }
        Ok(())
    }

    /// Sections that differ from the loaded envelope.
    pub fn changed_sections(&self) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .zip(self.loaded)
            .filter(|&(section, crc)| self.envelope.section_crc(section) != crc)
            .map(|(section, _)| section)
            .collect()
    }

    /// Writes the envelope back if anything changed since it was loaded. Returns whether a write
    /// took place.
    pub fn commit(&mut self) -> Result<bool> {
        let changed = self.changed_sections();
        if changed.is_empty() {
            log::info!("Bootloader message unchanged, skipping store");
            return Ok(false);
        }

        match &mut self.backend {
            Backend::Redundant(store) => store.store(&mut self.envelope, self.sync)?,
            Backend::Direct(store) => {
                for section in changed {
                    store.store(&self.envelope, section)?;
                }
            }
        }

        self.loaded = Section::ALL.map(|section| self.envelope.section_crc(section));
        Ok(true)
    }
}
