// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Binary layout of the AB-specific bootloader message kept in the misc partition.
//!
//! The 4-KiB envelope starts with the bootloader message, embeds the A/B control record in its
//! slot suffix area, and ends with the epoch byte and the CRC protecting the whole structure.

pub mod control;
pub mod message;

use crate::crc::crc32_raw;
use crate::error::Result;
use control::{CONTROL_SIZE, ControlRecord};
use message::{MESSAGE_SIZE, MessageRecord};
use std::ops::Range;

pub const ENVELOPE_SIZE: usize = 4096;
pub const CONTROL_OFFSET: usize = MESSAGE_SIZE;
pub const UPDATE_CHANNEL_OFFSET: usize = CONTROL_OFFSET + CONTROL_SIZE;
pub const UPDATE_CHANNEL_SIZE: usize = 128;
pub const FLAGS_OFFSET: usize = UPDATE_CHANNEL_OFFSET + UPDATE_CHANNEL_SIZE;
pub const CRC_OFFSET: usize = FLAGS_OFFSET + 1;
const TAIL_OFFSET: usize = CRC_OFFSET + 4;

/// Sub-records that can be written on their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Message,
    Control,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Message, Section::Control];

    /// Byte range of the section inside the envelope.
    pub fn range(self) -> Range<usize> {
        match self {
            Section::Message => 0..MESSAGE_SIZE,
            Section::Control => CONTROL_OFFSET..CONTROL_OFFSET + CONTROL_SIZE,
        }
    }
}

/// `struct bootloader_message_ab`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub message: MessageRecord,
    /// Slot suffix area, normally holding a [`ControlRecord`].
    pub control: [u8; CONTROL_SIZE],
    pub update_channel: [u8; UPDATE_CHANNEL_SIZE],
    /// Epoch counter telling which of two redundant copies is the most recent.
    pub flags: u8,
    pub crc32: u32,
    pub reserved: Vec<u8>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            message: MessageRecord::default(),
            control: [0; CONTROL_SIZE],
            update_channel: [0; UPDATE_CHANNEL_SIZE],
            flags: 0,
            crc32: 0,
            reserved: vec![0; ENVELOPE_SIZE - TAIL_OFFSET],
        }
    }
}

impl Envelope {
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        Some(Self {
            message: MessageRecord::from_slice(s.get(..MESSAGE_SIZE)?)?,
            control: s.get(Section::Control.range())?.try_into().ok()?,
            update_channel: s
                .get(UPDATE_CHANNEL_OFFSET..FLAGS_OFFSET)?
                .try_into()
                .ok()?,
            flags: *s.get(FLAGS_OFFSET)?,
            crc32: u32::from_le_bytes(s.get(CRC_OFFSET..TAIL_OFFSET)?.try_into().ok()?),
            reserved: s.get(TAIL_OFFSET..ENVELOPE_SIZE)?.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENVELOPE_SIZE);

        bytes.append(&mut self.message.to_bytes());
        bytes.extend_from_slice(&self.control);
        bytes.extend_from_slice(&self.update_channel);
        bytes.push(self.flags);
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        bytes.extend_from_slice(&self.reserved);

        debug_assert_eq!(bytes.len(), ENVELOPE_SIZE);
        bytes
    }

    /// CRC of every byte preceding the CRC field.
    pub fn compute_crc(&self) -> u32 {
        crc32_raw(&self.to_bytes()[..CRC_OFFSET])
    }

    pub fn verify_crc(&self) -> bool {
        self.compute_crc() == self.crc32
    }

    pub fn seal_crc(&mut self) {
        self.crc32 = 0;
        self.crc32 = self.compute_crc();
    }

    /// Decodes and validates the embedded control record.
    pub fn control_record(&self) -> Result<ControlRecord> {
        let record = ControlRecord::from_bytes(&self.control);
        record.validate()?;
        Ok(record)
    }

    pub fn set_control_record(&mut self, record: &ControlRecord) {
        self.control.copy_from_slice(&record.to_bytes());
    }

    /// CRC-32 of one section, used to detect whether it changed.
    pub fn section_crc(&self, section: Section) -> u32 {
        crate::crc::crc32(&self.to_bytes()[section.range()])
    }
}
