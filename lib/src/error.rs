// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the bootloader message library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not open device {}: {source}", path.display())]
    DeviceOpenFailed { path: PathBuf, source: io::Error },
    #[error("short transfer at 0x{offset:x} (expected {expected} bytes, got {actual})")]
    ShortTransfer {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("no valid AB-specific bootloader message area found")]
    NoValidCopy,
    #[error("invalid CRC32 (expected {expected:08x}, found {found:08x})")]
    CrcMismatch { expected: u32, found: u32 },
    #[error("invalid A/B metadata (magic {magic:08x}, version {version})")]
    BadMagicOrVersion { magic: u32, version: u8 },
    #[error("invalid field '{0}'")]
    InvalidField(String),
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),
    #[error("invalid slot '{0}'")]
    InvalidSlot(String),
    #[error("no valid block found from offset 0x{offset:x}")]
    NoValidBlock { offset: u64 },
    #[error("could not erase block at 0x{offset:x} (size {len}): {source}")]
    EraseFailed {
        offset: u64,
        len: u32,
        source: io::Error,
    },
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),
    #[error("direct write to a single device requires explicit acknowledgment")]
    DirectWriteNotAllowed,
    #[error("expected one or two devices, got {0}")]
    DeviceCount(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
