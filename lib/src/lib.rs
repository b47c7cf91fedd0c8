// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Power-loss safe access to the bootloader message kept in the misc partition.
//!
//! The message is stored as a fixed-size envelope holding the bootloader control block (BCB),
//! the A/B boot control record (ABC), an epoch counter and a CRC. Two copies of the envelope are
//! kept on two devices, and every update overwrites the stale copy only.
//!
//! # Usage
//!
//! ```no_run
//! use bootloader_message::prelude::*;
//!
//! let mut misc = Misc::open(&["/dev/mtd3", "/dev/mtd4"], &Options::default())?;
//! let slot = misc.active_slot()?;
//! misc.mark(SlotMark::Successful, slot)?;
//! misc.commit()?;
//! # Ok::<(), Error>(())
//! ```

pub mod board;
pub mod crc;
pub mod device;
mod error;
pub mod misc;
pub mod record;
pub mod store;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::Error;
    pub use crate::board::{BoardMirror, SlotMark};
    pub use crate::misc::{Misc, Options};
    pub use crate::record::Envelope;
    pub use crate::record::control::{ControlRecord, Slot, SlotMetadata};
    pub use crate::record::message::{Field, FieldView, MessageRecord, TestOp};
}
