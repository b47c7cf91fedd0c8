// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

pub mod flash_types {
    pub const ABSENT: u8 = 0;
    pub const RAM: u8 = 1;
    pub const ROM: u8 = 2;
    pub const NOR_FLASH: u8 = 3;
    pub const NAND_FLASH: u8 = 4;
    pub const DATA_FLASH: u8 = 6;
    pub const UBI_VOLUME: u8 = 7;
    pub const MLC_NAND_FLASH: u8 = 8;
}

// Request codes from <mtd/mtd-abi.h>.
const MEMGETINFO: u32 = 0x8020_4d01;
const MEMERASE: u32 = 0x4008_4d02;
const MEMGETBADBLOCK: u32 = 0x4008_4d0b;

/// Geometry of a raw flash device, laid out as `struct mtd_info_user`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct FlashInfo {
    pub kind: u8,
    pub flags: u32,
    pub size: u32,
    pub erase_size: u32,
    pub write_size: u32,
    pub oob_size: u32,
    padding: u64,
}

impl FlashInfo {
    pub fn new(kind: u8, size: u32, erase_size: u32, write_size: u32) -> Self {
        Self {
            kind,
            size,
            erase_size,
            write_size,
            ..Self::default()
        }
    }

    /// NAND devices are the only ones carrying bad block markers.
    pub fn is_nand(&self) -> bool {
        matches!(
            self.kind,
            flash_types::NAND_FLASH | flash_types::MLC_NAND_FLASH
        )
    }

    /// Granularity of the transfers, never zero.
    pub fn page_size(&self) -> u64 {
        u64::from(self.write_size.max(1))
    }

    /// Size of an erase block, never zero.
    pub fn block_size(&self) -> u64 {
        u64::from(self.erase_size.max(1))
    }
}

#[repr(C)]
struct EraseInfo {
    start: u32,
    length: u32,
}

/// Queries the MTD geometry of `file`. Anything that does not answer is a block device.
pub(super) fn probe(file: &File) -> Option<FlashInfo> {
    let mut info = FlashInfo::default();
    // SAFETY: MEMGETINFO fills a `struct mtd_info_user`, which `FlashInfo` mirrors.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), MEMGETINFO as _, &mut info) };
    if ret != 0 {
        return None;
    }

    log::debug!(
        "MTD info: type {}, flags {}, size {}, erasesize {}, writesize {}, oobsize {}",
        info.kind,
        info.flags,
        info.size,
        info.erase_size,
        info.write_size,
        info.oob_size
    );
    Some(info)
}

pub(super) fn is_bad_block(file: &File, offset: u64) -> io::Result<bool> {
    let mut offset = offset as libc::loff_t;
    // SAFETY: MEMGETBADBLOCK reads a single `loff_t`.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), MEMGETBADBLOCK as _, &mut offset) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret > 0)
}

pub(super) fn erase(file: &File, offset: u64, len: u32) -> io::Result<()> {
    let start = u32::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "erase offset out of range"))?;
    let mut erase_info = EraseInfo { start, length: len };
    // SAFETY: MEMERASE reads a `struct erase_info_user`, which `EraseInfo` mirrors.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), MEMERASE as _, &mut erase_info) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
