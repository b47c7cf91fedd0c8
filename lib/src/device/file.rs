// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

use super::{FlashInfo, RawDevice, mtd};
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Device node (or image file) opened for reading and writing.
///
/// The handle is closed when the value is dropped.
pub struct Device {
    file: File,
    path: PathBuf,
    flash: Option<FlashInfo>,
}

impl Device {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| {
                log::error!("Could not open device {}: {source}", path.display());
                Error::DeviceOpenFailed {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        let flash = mtd::probe(&file);
        if flash.is_none() {
            log::debug!("{} is accessed as a block device", path.display());
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            flash,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawDevice for Device {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        self.file.write_at(buf, offset)
    }

    fn flash_info(&mut self) -> Option<FlashInfo> {
        self.flash
    }

    fn is_bad_block(&mut self, offset: u64) -> io::Result<bool> {
        mtd::is_bad_block(&self.file, offset).inspect_err(|err| {
            log::error!("Can not find bad block at offset 0x{offset:x}: {err}");
        })
    }

    fn erase(&mut self, offset: u64, len: u32) -> io::Result<()> {
        mtd::erase(&self.file, offset, len)?;
        log::debug!("Block at offset 0x{offset:x} (size {len}) erased");
        Ok(())
    }
}
