// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Bad-block aware transfers on raw flash.
//!
//! Logical offsets are translated to physical ones by skipping every bad erase block found
//! between the start of the device and the target. Writes go through a read-modify-write cycle
//! of the whole containing erase block, since flash can only be programmed after an erase.

use super::{FlashInfo, RawDevice, read_exact_at, write_exact_at};
use crate::error::{Error, Result};

/// Rounds `x` down to a multiple of `align`.
///
/// `align` must be non-zero. The result is always `<= x`.
pub fn align_down(x: u64, align: u64) -> u64 {
    x - x % align
}

/// Returns the first usable physical offset for the logical offset `from`, scanning the region
/// `[start, start + len)`.
///
/// Every bad block located between `start` and the target pushes the target one erase block
/// further. The target then moves forward by whole erase blocks, keeping its offset inside the
/// block, until it lands outside a bad block. `from` does not need to be aligned. The device is
/// never queried at or past the end of the region.
pub fn skip_bad_blocks<D: RawDevice + ?Sized>(
    dev: &mut D,
    info: &FlashInfo,
    start: u64,
    len: u64,
    from: u64,
) -> Result<u64> {
    let block_size = info.block_size();

    let end = start + len;
    let mut target = from;
    let mut bbs_offset = start;
    while bbs_offset < target && bbs_offset < end {
        if dev.is_bad_block(bbs_offset)? {
            log::warn!(
                "skip_bad_blocks: bad block at 0x{:x}",
                align_down(bbs_offset, block_size)
            );
            target += block_size;
        }
        bbs_offset += block_size;
    }

    let mut cursor = target;
    while cursor < end {
        if !dev.is_bad_block(cursor)? {
            return Ok(cursor);
        }
        log::warn!(
            "skip_bad_blocks: skipping bad block at 0x{:x}",
            align_down(cursor, block_size)
        );
        cursor += block_size;
    }

    log::error!("skip_bad_blocks: no valid blocks found");
    Err(Error::NoValidBlock { offset: from })
}

/// Maps a logical offset to a physical one. Only NAND devices have bad blocks to skip.
fn virt_to_phys<D: RawDevice + ?Sized>(dev: &mut D, info: &FlashInfo, from: u64) -> Result<u64> {
    if !info.is_nand() {
        return Ok(from);
    }

    let phys = skip_bad_blocks(dev, info, 0, u64::from(info.size), from)?;
    log::debug!("virt_to_phys: original from: 0x{from:x} new from: 0x{phys:x}");
    Ok(phys)
}

/// Reads `buf.len()` bytes at the logical `offset`, at most one page per transfer.
pub fn read_bbs<D: RawDevice + ?Sized>(
    dev: &mut D,
    info: &FlashInfo,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let page_size = info.page_size();
    let mut done = 0;

    while done < buf.len() {
        let cur = offset + done as u64;
        let phys = virt_to_phys(dev, info, cur)?;
        // Stop at the page boundary so a chunk never straddles two erase blocks.
        let chunk = (buf.len() - done).min((page_size - cur % page_size) as usize);
        read_exact_at(dev, phys, &mut buf[done..done + chunk])?;
        done += chunk;
    }

    log::debug!("Reading {done} bytes from offset 0x{offset:x}");
    Ok(())
}

/// Writes `data` at the logical `offset`, preserving the untouched bytes of every erase block
/// involved. Returns the number of bytes written.
pub fn write_bbs<D: RawDevice + ?Sized>(
    dev: &mut D,
    info: &FlashInfo,
    offset: u64,
    data: &[u8],
) -> Result<usize> {
    let block_size = info.block_size();
    let block_len = block_size as usize;

    let mut block = Vec::new();
    block
        .try_reserve_exact(block_len)
        .map_err(|_| {
            log::error!("Out of memory");
            Error::OutOfMemory(block_len)
        })?;
    block.resize(block_len, 0);

    let mut done = 0;
    while done < data.len() {
        let phys = virt_to_phys(dev, info, offset + done as u64)?;
        // The scratch block always starts on an erase block boundary.
        let erase_start = align_down(phys, block_size);
        let in_block = (phys - erase_start) as usize;
        let chunk = (block_len - in_block).min(data.len() - done);

        read_exact_at(dev, erase_start, &mut block)?;
        block[in_block..in_block + chunk].copy_from_slice(&data[done..done + chunk]);
        erase_write(dev, info, erase_start, &block)?;

        done += chunk;
    }

    Ok(done)
}

fn erase_write<D: RawDevice + ?Sized>(
    dev: &mut D,
    info: &FlashInfo,
    start: u64,
    block: &[u8],
) -> Result<()> {
    dev.erase(start, info.erase_size)
        .map_err(|source| {
            log::error!("Unable to erase block at offset 0x{start:x}: {source}");
            Error::EraseFailed {
                offset: start,
                len: info.erase_size,
                source,
            }
        })?;
    write_exact_at(dev, start, block)
}
