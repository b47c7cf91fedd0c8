// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! In-memory devices used by the tests.

use super::{FlashInfo, RawDevice, flash_types};
use std::collections::BTreeSet;
use std::io;

/// NAND-like flash: programming can only clear bits, erasing sets a whole block to `0xFF`.
pub struct SimFlash {
    pub data: Vec<u8>,
    pub info: FlashInfo,
    pub bad_blocks: BTreeSet<u64>,
    pub erased: Vec<u64>,
    /// Number of transfers that touched a bad block.
    pub bad_accesses: usize,
    pub fail_erase: bool,
}

impl SimFlash {
    pub fn nand(blocks: u32, erase_size: u32, write_size: u32) -> Self {
        Self::with_kind(flash_types::NAND_FLASH, blocks, erase_size, write_size)
    }

    pub fn nor(blocks: u32, erase_size: u32, write_size: u32) -> Self {
        Self::with_kind(flash_types::NOR_FLASH, blocks, erase_size, write_size)
    }

    fn with_kind(kind: u8, blocks: u32, erase_size: u32, write_size: u32) -> Self {
        let size = blocks * erase_size;
        Self {
            data: vec![0xFF; size as usize],
            info: FlashInfo::new(kind, size, erase_size, write_size),
            bad_blocks: BTreeSet::new(),
            erased: Vec::new(),
            bad_accesses: 0,
            fail_erase: false,
        }
    }

    /// Marks `blocks` as bad and fills them with a recognizable pattern.
    pub fn mark_bad(&mut self, blocks: &[u64]) {
        for &block in blocks {
            self.bad_blocks.insert(block);
            let range = self.block_range(block);
            self.data[range].fill(0xBB);
        }
    }

    pub fn block_range(&self, block: u64) -> std::ops::Range<usize> {
        let start = (block * u64::from(self.info.erase_size)) as usize;
        start..start + self.info.erase_size as usize
    }

    fn touches_bad_block(&self, offset: u64, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        let erase_size = u64::from(self.info.erase_size);
        let first = offset / erase_size;
        let last = (offset + len as u64 - 1) / erase_size;
        (first..=last).any(|block| self.bad_blocks.contains(&block))
    }

    fn check_range(&self, offset: u64, len: usize) -> io::Result<usize> {
        let start = offset as usize;
        if start + len > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"));
        }
        Ok(start)
    }
}

impl RawDevice for SimFlash {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if self.touches_bad_block(offset, buf.len()) {
            self.bad_accesses += 1;
        }
        let start = self.check_range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(buf.len())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        if self.touches_bad_block(offset, buf.len()) {
            self.bad_accesses += 1;
        }
        let start = self.check_range(offset, buf.len())?;
        for (cell, byte) in self.data[start..start + buf.len()].iter_mut().zip(buf) {
            *cell &= *byte;
        }
        Ok(buf.len())
    }

    fn flash_info(&mut self) -> Option<FlashInfo> {
        Some(self.info)
    }

    fn is_bad_block(&mut self, offset: u64) -> io::Result<bool> {
        // MEMGETBADBLOCK rejects offsets past the end of the device.
        if offset >= u64::from(self.info.size) {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        Ok(self
            .bad_blocks
            .contains(&(offset / u64::from(self.info.erase_size))))
    }

    fn erase(&mut self, offset: u64, len: u32) -> io::Result<()> {
        if self.fail_erase {
            return Err(io::Error::other("erase failure"));
        }
        let start = self.check_range(offset, len as usize)?;
        self.data[start..start + len as usize].fill(0xFF);
        self.erased.push(offset);
        Ok(())
    }
}

/// Plain block device backed by a byte vector.
#[derive(Default)]
pub struct MemDisk {
    pub data: Vec<u8>,
    pub writes: usize,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Caps every transfer to this many bytes when set.
    pub short_transfers: Option<usize>,
}

impl MemDisk {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            ..Self::default()
        }
    }

    pub fn with_content(offset: usize, content: &[u8], size: usize) -> Self {
        let mut disk = Self::new(size);
        disk.data[offset..offset + content.len()].copy_from_slice(content);
        disk
    }
}

impl RawDevice for MemDisk {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_reads {
            return Err(io::Error::other("read failure"));
        }
        let start = (offset as usize).min(self.data.len());
        let mut len = buf.len().min(self.data.len() - start);
        if let Some(cap) = self.short_transfers {
            len = len.min(cap);
        }
        buf[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(len)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::other("write failure"));
        }
        self.writes += 1;
        let start = (offset as usize).min(self.data.len());
        let mut len = buf.len().min(self.data.len() - start);
        if let Some(cap) = self.short_transfers {
            len = len.min(cap);
        }
        self.data[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }

    fn flash_info(&mut self) -> Option<FlashInfo> {
        None
    }

    fn is_bad_block(&mut self, _offset: u64) -> io::Result<bool> {
        Ok(false)
    }

    fn erase(&mut self, _offset: u64, _len: u32) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}
