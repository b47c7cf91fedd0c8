// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Redundant storage of the envelope.
//!
//! Two copies of the envelope live at the same offset of two devices. Loading picks the most
//! recent copy that passes its CRC check, storing always overwrites the other one, so an
//! interrupted write leaves the previous copy untouched.

#[cfg(test)]
mod tests;

use crate::device::{self, RawDevice};
use crate::error::{Error, Result};
use crate::record::{ENVELOPE_SIZE, Envelope, Section};

/// One of the two redundant copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Primary,
    Secondary,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Primary => Side::Secondary,
            Side::Secondary => Side::Primary,
        }
    }
}

/// Which copy is authoritative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validity {
    #[default]
    Invalid,
    PrimaryValid,
    SecondaryValid,
}

impl From<Side> for Validity {
    fn from(side: Side) -> Self {
        match side {
            Side::Primary => Validity::PrimaryValid,
            Side::Secondary => Validity::SecondaryValid,
        }
    }
}

/// Trust information about a copy that could be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub crc_ok: bool,
    pub epoch: u8,
}

impl Candidate {
    pub fn of(envelope: &Envelope) -> Self {
        Self {
            crc_ok: envelope.verify_crc(),
            epoch: envelope.flags,
        }
    }
}

/// Picks the authoritative copy. `None` stands for a copy that could not be read.
///
/// A single CRC-valid copy always wins. Otherwise the greater epoch wins, except that 0 is newer
/// than 255 since the counter wraps. Equal epochs keep the primary copy.
pub fn select(primary: Option<Candidate>, secondary: Option<Candidate>) -> Result<Side> {
    let (primary, secondary) = match (primary, secondary) {
        (None, None) => {
            log::error!("No valid AB-specific bootloader message area found");
            return Err(Error::NoValidCopy);
        }
        (Some(_), None) => return Ok(Side::Primary),
        (None, Some(_)) => return Ok(Side::Secondary),
        (Some(primary), Some(secondary)) => (primary, secondary),
    };

    match (primary.crc_ok, secondary.crc_ok) {
        (true, false) => return Ok(Side::Primary),
        (false, true) => return Ok(Side::Secondary),
        _ => {}
    }

    log::debug!(
        "select: flags1 = {}, flags2 = {}",
        primary.epoch,
        secondary.epoch
    );
    Ok(match (primary.epoch, secondary.epoch) {
        (255, 0) => Side::Secondary,
        (0, 255) => Side::Primary,
        (a, b) if b > a => Side::Secondary,
        _ => Side::Primary,
    })
}

/// Envelope copies kept on two devices.
pub struct RedundantStore<D> {
    primary: D,
    secondary: D,
    offset: u64,
    validity: Validity,
    epoch: u8,
}

impl<D: RawDevice> RedundantStore<D> {
    pub fn new(primary: D, secondary: D, offset: u64) -> Self {
        Self {
            primary,
            secondary,
            offset,
            validity: Validity::Invalid,
            epoch: 0,
        }
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// Epoch of the authoritative copy.
    pub fn epoch(&self) -> u8 {
        self.epoch
    }

    fn device(&mut self, side: Side) -> &mut D {
        match side {
            Side::Primary => &mut self.primary,
            Side::Secondary => &mut self.secondary,
        }
    }

    fn read_copy(&mut self, side: Side) -> Option<Envelope> {
        let offset = self.offset;
        match device::read(self.device(side), offset, ENVELOPE_SIZE) {
            Ok(bytes) => Envelope::from_slice(&bytes),
            Err(err) => {
                log::error!("Failed to read {side:?} copy: {err}");
                None
            }
        }
    }

    /// Reads both copies and returns the authoritative one.
    pub fn load(&mut self) -> Result<Envelope> {
        let primary = self.read_copy(Side::Primary);
        let secondary = self.read_copy(Side::Secondary);

        if primary.is_some() != secondary.is_some() {
            log::warn!(
                "Some problems detected reading AB-specific bootloader message; recovered successfully"
            );
        }

        let candidate = |copy: &Option<Envelope>| {
            copy.as_ref().map(|envelope| {
                let candidate = Candidate::of(envelope);
                log::debug!("CRC = 0x{:08x}, valid: {}", envelope.crc32, candidate.crc_ok);
                candidate
            })
        };
        let side = select(candidate(&primary), candidate(&secondary))?;

        let envelope = match side {
            Side::Primary => primary,
            Side::Secondary => secondary,
        }
        .ok_or(Error::NoValidCopy)?;

        if !envelope.verify_crc() {
            log::warn!("No copy of the AB-specific bootloader message passed its CRC check");
        }

        self.validity = side.into();
        self.epoch = envelope.flags;
        Ok(envelope)
    }

    /// Bumps the epoch, seals the CRC and writes the envelope over the copy that was not
    /// authoritative. With `sync`, the other copy is overwritten as well.
    pub fn store(&mut self, envelope: &mut Envelope, sync: bool) -> Result<()> {
        envelope.flags = self.epoch.wrapping_add(1);
        envelope.seal_crc();

        let target = match self.validity {
            Validity::PrimaryValid => Side::Secondary,
            Validity::SecondaryValid | Validity::Invalid => Side::Primary,
        };

        let bytes = envelope.to_bytes();
        let offset = self.offset;
        device::write(self.device(target), offset, &bytes).inspect_err(|err| {
            log::error!("Failed to write {target:?} copy: {err}");
        })?;

        self.validity = target.into();
        self.epoch = envelope.flags;

        if sync {
            device::write(self.device(target.other()), offset, &bytes).inspect_err(|err| {
                log::error!("Failed to write {:?} copy: {err}", target.other());
            })?;
        }

        log::info!(
            "AB-specific bootloader message stored (epoch {}, {target:?} copy)",
            self.epoch
        );
        Ok(())
    }
}

/// Envelope accessed in place on a single device.
///
/// There is no second copy to fall back on: a write interrupted by a power loss corrupts the
/// metadata. Writes are refused unless explicitly allowed.
pub struct DirectStore<D> {
    device: D,
    offset: u64,
    allow_write: bool,
}

impl<D: RawDevice> DirectStore<D> {
    pub fn new(device: D, offset: u64, allow_write: bool) -> Self {
        Self {
            device,
            offset,
            allow_write,
        }
    }

    pub fn load(&mut self) -> Result<Envelope> {
        log::warn!("Single device mode: updates of the bootloader message are not crash-safe");
        let bytes = device::read(&mut self.device, self.offset, ENVELOPE_SIZE)?;
        Envelope::from_slice(&bytes).ok_or(Error::NoValidCopy)
    }

    /// Writes a single section of the envelope back to the device.
    pub fn store(&mut self, envelope: &Envelope, section: Section) -> Result<()> {
        if !self.allow_write {
            log::error!("Direct write to a single device was not acknowledged");
            return Err(Error::DirectWriteNotAllowed);
        }

        let range = section.range();
        let offset = self.offset + range.start as u64;
        device::write(&mut self.device, offset, &envelope.to_bytes()[range])?;

        log::info!("{section:?} section stored in place");
        Ok(())
    }
}
