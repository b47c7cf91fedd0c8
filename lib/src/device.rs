// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Offset based access to the storage holding the bootloader message.
//!
//! Block devices (and regular files) are accessed with plain positioned transfers. Raw flash
//! devices are detected through their MTD geometry and go through the page-sized, bad-block
//! aware paths of the [`flash`] module.

mod file;
pub mod flash;
mod mtd;
#[cfg(test)]
pub(crate) mod sim;

use crate::error::{Error, Result};
use std::io;

pub use file::Device;
pub use mtd::{FlashInfo, flash_types};

/// Positioned I/O primitives consumed from the environment.
pub trait RawDevice {
    /// Reads at most `buf.len()` bytes at `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes at most `buf.len()` bytes at `offset`.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize>;

    /// Returns the flash geometry, or `None` when the device is a plain block device.
    fn flash_info(&mut self) -> Option<FlashInfo>;

    /// Tells whether the erase block containing `offset` is marked bad.
    fn is_bad_block(&mut self, offset: u64) -> io::Result<bool>;

    /// Erases `len` bytes starting at the erase-block aligned `offset`.
    fn erase(&mut self, offset: u64, len: u32) -> io::Result<()>;
}

/// Fills `buf` with the content of the device starting at the logical `offset`.
pub fn read_into<D: RawDevice + ?Sized>(dev: &mut D, offset: u64, buf: &mut [u8]) -> Result<()> {
    match dev.flash_info() {
        Some(info) => flash::read_bbs(dev, &info, offset, buf),
        None => read_exact_at(dev, offset, buf),
    }
}

/// Reads `len` bytes from the device starting at the logical `offset`.
pub fn read<D: RawDevice + ?Sized>(dev: &mut D, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory(len))?;
    buf.resize(len, 0);
    read_into(dev, offset, &mut buf)?;
    Ok(buf)
}

/// Writes `data` to the device at the logical `offset` and returns the number of bytes written.
pub fn write<D: RawDevice + ?Sized>(dev: &mut D, offset: u64, data: &[u8]) -> Result<usize> {
    match dev.flash_info() {
        Some(info) => flash::write_bbs(dev, &info, offset, data),
        None => {
            write_exact_at(dev, offset, data)?;
            Ok(data.len())
        }
    }
}

/// Single positioned read that must transfer the whole buffer.
pub(crate) fn read_exact_at<D: RawDevice + ?Sized>(
    dev: &mut D,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let actual = dev.read_at(offset, buf).inspect_err(|err| {
        log::error!("Unable to read from offset 0x{offset:x}: {err}");
    })?;

    if actual != buf.len() {
        log::warn!(
            "Wrong read length at 0x{offset:x} (expected {}, got {actual})",
            buf.len()
        );
        return Err(Error::ShortTransfer {
            offset,
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

/// Single positioned write that must transfer the whole buffer.
pub(crate) fn write_exact_at<D: RawDevice + ?Sized>(
    dev: &mut D,
    offset: u64,
    data: &[u8],
) -> Result<()> {
    let actual = dev.write_at(offset, data).inspect_err(|err| {
        log::error!("Unable to write to offset 0x{offset:x}: {err}");
    })?;

    if actual != data.len() {
        log::warn!(
            "Wrong write length at 0x{offset:x} (expected {}, written {actual})",
            data.len()
        );
        return Err(Error::ShortTransfer {
            offset,
            expected: data.len(),
            actual,
        });
    }
    Ok(())
}
