// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! A/B boot control metadata (`struct bootloader_control`).

use crate::crc::crc32;
use crate::error::{Error, Result};
#[cfg(feature = "serialize")]
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const CONTROL_SIZE: usize = 32;
pub const MAGIC: u32 = 0x42414342;
pub const VERSION: u8 = 1;
pub const MAX_SLOTS: usize = 4;
pub const DEFAULT_SLOTS: u8 = 2;
pub const MAX_PRIORITY: u8 = 15;
pub const MAX_TRIES_REMAINING: u8 = 7;

const SLOT_INFO_OFFSET: usize = 12;
const SLOT_INFO_SIZE: usize = 2;
const CRC_OFFSET: usize = 28;

/// Index of a boot slot, displayed as its letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot(usize);

impl Slot {
    pub const A: Slot = Slot(0);
    pub const B: Slot = Slot(1);

    pub fn new(index: usize) -> Result<Self> {
        if index >= MAX_SLOTS {
            return Err(Error::InvalidSlot(index.to_string()));
        }
        Ok(Slot(index))
    }

    /// Maps a suffix character (`a`, `B`, ...) to its slot.
    pub fn from_suffix_char(c: u8) -> Result<Self> {
        let index = c.to_ascii_uppercase().wrapping_sub(b'A') as usize;
        Slot::new(index).map_err(|_| Error::InvalidSlot((c as char).to_string()))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn name(self) -> char {
        (b'A' + self.0 as u8) as char
    }

    /// Partition suffix, like `_a`.
    pub fn suffix(self) -> String {
        format!("_{}", self.name().to_ascii_lowercase())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Accepts either a slot number (`0`, `1`, ...) or a slot letter (`a`, `B`, ...).
impl FromStr for Slot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidSlot(s.to_string());
        let &[c] = s.as_bytes() else {
            return Err(invalid());
        };
        if c.is_ascii_digit() {
            Slot::new((c - b'0') as usize).map_err(|_| invalid())
        } else if c.is_ascii_alphabetic() {
            Slot::from_suffix_char(c).map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

/// Per-slot boot accounting, packed in two bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct SlotMetadata {
    /// 15 is the highest priority, 0 means the slot is never selected.
    pub priority: u8,
    pub tries_remaining: u8,
    pub successful_boot: bool,
    pub verity_corrupted: bool,
}

impl SlotMetadata {
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        Some(Self::from_bytes(s.get(..SLOT_INFO_SIZE)?.try_into().ok()?))
    }

    pub fn from_bytes(bytes: [u8; SLOT_INFO_SIZE]) -> Self {
        let [bits, flags] = bytes;
        Self {
            priority: bits & 0xf,
            tries_remaining: (bits >> 4) & 0x7,
            successful_boot: bits & 0x80 != 0,
            verity_corrupted: flags & 1 != 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; SLOT_INFO_SIZE] {
        [
            (self.priority & 0xf)
                | (self.tries_remaining & 0x7) << 4
                | (self.successful_boot as u8) << 7,
            self.verity_corrupted as u8,
        ]
    }

    pub fn is_bootable(&self) -> bool {
        self.priority != 0
    }
}

/// `struct bootloader_control`, stored in the slot suffix area of the envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlRecord {
    /// NUL-padded active slot suffix.
    pub slot_suffix: [u8; 4],
    pub magic: u32,
    pub version: u8,
    pub nb_slot: u8,
    pub recovery_tries_remaining: u8,
    pub reserved0: [u8; 2],
    pub slot_info: [SlotMetadata; MAX_SLOTS],
    pub reserved1: [u8; 8],
    /// CRC-32 of the 28 preceding bytes.
    pub crc32: u32,
}

impl Default for ControlRecord {
    fn default() -> Self {
        Self::default_layout()
    }
}

impl ControlRecord {
    /// Fresh sealed record: slot `a` active, two slots at maximum priority and tries.
    pub fn default_layout() -> Self {
        let slot = SlotMetadata {
            priority: MAX_PRIORITY,
            tries_remaining: MAX_TRIES_REMAINING,
            successful_boot: false,
            verity_corrupted: false,
        };
        let mut slot_info = [SlotMetadata::default(); MAX_SLOTS];
        slot_info[..DEFAULT_SLOTS as usize].fill(slot);

        let mut record = Self {
            slot_suffix: *b"a\0\0\0",
            magic: MAGIC,
            version: VERSION,
            nb_slot: DEFAULT_SLOTS,
            recovery_tries_remaining: 0,
            reserved0: [0; 2],
            slot_info,
            reserved1: [0; 8],
            crc32: 0,
        };
        record.seal_crc();
        record
    }

    /// Decodes the record without checking it, see [`ControlRecord::validate`].
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        Some(Self::from_bytes(s.get(..CONTROL_SIZE)?.try_into().ok()?))
    }

    /// Decodes a whole control area, see [`ControlRecord::validate`].
    pub fn from_bytes(b: &[u8; CONTROL_SIZE]) -> Self {
        let word = |at: usize| u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]]);
        let slot_info = std::array::from_fn(|i| {
            let offset = SLOT_INFO_OFFSET + i * SLOT_INFO_SIZE;
            SlotMetadata::from_bytes([b[offset], b[offset + 1]])
        });

        Self {
            slot_suffix: [b[0], b[1], b[2], b[3]],
            magic: word(4),
            version: b[8],
            nb_slot: b[9] & 0x7,
            recovery_tries_remaining: (b[9] >> 3) & 0x7,
            reserved0: [b[10], b[11]],
            slot_info,
            reserved1: [b[20], b[21], b[22], b[23], b[24], b[25], b[26], b[27]],
            crc32: word(CRC_OFFSET),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CONTROL_SIZE);

        bytes.extend_from_slice(&self.slot_suffix);
        bytes.extend_from_slice(&self.magic.to_le_bytes());
        bytes.push(self.version);
        bytes.push((self.nb_slot & 0x7) | (self.recovery_tries_remaining & 0x7) << 3);
        bytes.extend_from_slice(&self.reserved0);
        for slot in self.slot_info.iter() {
            bytes.extend_from_slice(&slot.to_bytes());
        }
        bytes.extend_from_slice(&self.reserved1);
        bytes.extend_from_slice(&self.crc32.to_le_bytes());

        debug_assert_eq!(bytes.len(), CONTROL_SIZE);
        bytes
    }

    pub fn compute_crc(&self) -> u32 {
        crc32(&self.to_bytes()[..CRC_OFFSET])
    }

    pub fn seal_crc(&mut self) {
        self.crc32 = self.compute_crc();
    }

    /// Checks the CRC, then the magic number and the version.
    pub fn validate(&self) -> Result<()> {
        let expected = self.compute_crc();
        if expected != self.crc32 {
            log::error!(
                "Invalid CRC32 (expected {expected:08x}, found {:08x})",
                self.crc32
            );
            return Err(Error::CrcMismatch {
                expected,
                found: self.crc32,
            });
        }

        if self.magic != MAGIC || self.version != VERSION {
            log::error!("Invalid A/B metadata magic or version");
            return Err(Error::BadMagicOrVersion {
                magic: self.magic,
                version: self.version,
            });
        }

        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        usize::from(self.nb_slot).min(MAX_SLOTS)
    }

    /// Slot designated by the first non-zero character of the suffix.
    pub fn active_slot(&self) -> Result<Slot> {
        let c = self
            .slot_suffix
            .iter()
            .copied()
            .find(|&c| c != 0)
            .ok_or_else(|| Error::InvalidSlot(String::new()))?;
        Slot::from_suffix_char(c)
    }

    fn check_slot(&self, slot: Slot) -> Result<usize> {
        if slot.index() >= self.slot_count() {
            log::error!("Wrong slot value {slot}");
            return Err(Error::InvalidSlot(slot.to_string()));
        }
        Ok(slot.index())
    }

    pub fn slot(&self, slot: Slot) -> Result<&SlotMetadata> {
        Ok(&self.slot_info[self.check_slot(slot)?])
    }

    pub fn slots(&self) -> impl Iterator<Item = (Slot, &SlotMetadata)> {
        self.slot_info[..self.slot_count()]
            .iter()
            .enumerate()
            .map(|(i, slot)| (Slot(i), slot))
    }

    pub fn is_bootable(&self, slot: Slot) -> Result<bool> {
        Ok(self.slot(slot)?.is_bootable())
    }

    pub fn is_successful(&self, slot: Slot) -> Result<bool> {
        Ok(self.slot(slot)?.successful_boot)
    }

    pub fn mark_successful(&mut self, slot: Slot) -> Result<()> {
        let slotp = &mut self.slot_info[self.check_slot(slot)?];
        slotp.successful_boot = true;
        slotp.tries_remaining = MAX_TRIES_REMAINING;

        log::info!("Slot {slot} marked as successful");
        Ok(())
    }

    /// Gives `slot` the highest priority. Any other slot sharing that priority is demoted by one
    /// so that a single slot stays preferred.
    pub fn mark_active(&mut self, slot: Slot) -> Result<()> {
        let index = self.check_slot(slot)?;
        let count = self.slot_count();

        for (i, slotp) in self.slot_info[..count].iter_mut().enumerate() {
            if i == index {
                slotp.priority = MAX_PRIORITY;
                slotp.tries_remaining = MAX_TRIES_REMAINING;
                slotp.successful_boot = false;
            } else if slotp.priority == MAX_PRIORITY {
                slotp.priority = MAX_PRIORITY - 1;
            }
        }

        log::info!("Slot {slot} marked as next active");
        Ok(())
    }

    pub fn mark_unbootable(&mut self, slot: Slot) -> Result<()> {
        let slotp = &mut self.slot_info[self.check_slot(slot)?];
        slotp.successful_boot = false;
        slotp.priority = 0;
        slotp.tries_remaining = 0;

        log::info!("Slot {slot} marked as unbootable");
        Ok(())
    }

    /// Slot report as JSON.
    #[cfg(feature = "serialize")]
    pub fn to_json(&self) -> serde_json::Value {
        let slots: Vec<serde_json::Value> = self
            .slots()
            .map(|(slot, meta)| {
                serde_json::json!({
                    "slot": slot.name().to_string(),
                    "suffix": slot.suffix(),
                    "metadata": meta,
                })
            })
            .collect();

        serde_json::json!({
            "active": self.active_slot().ok().map(|slot| slot.name().to_string()),
            "nb_slot": self.nb_slot,
            "slots": slots,
        })
    }
}
