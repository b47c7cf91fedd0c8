// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Interface towards board specific mirrors of the slot state, like a syscon register.

use crate::error::Result;
use crate::record::control::{ControlRecord, Slot};
use std::fmt;

/// Kind of update applied to a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotMark {
    Successful,
    Unbootable,
    Active,
}

impl fmt::Display for SlotMark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotMark::Successful => write!(f, "successful"),
            SlotMark::Unbootable => write!(f, "unbootable"),
            SlotMark::Active => write!(f, "active"),
        }
    }
}

/// Receives every slot mark applied to the control record.
pub trait BoardMirror {
    fn mark(&mut self, mark: SlotMark, slot: Slot) -> Result<()>;
}

impl ControlRecord {
    pub fn apply_mark(&mut self, mark: SlotMark, slot: Slot) -> Result<()> {
        match mark {
            SlotMark::Successful => self.mark_successful(slot),
            SlotMark::Unbootable => self.mark_unbootable(slot),
            SlotMark::Active => self.mark_active(slot),
        }
    }
}
