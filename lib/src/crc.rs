// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! CRC-32 (reversed polynomial 0xEDB88320) routines used to seal stored records.
//!
//! Two flavours coexist on disk: the control record carries the classic CRC-32/ISO-HDLC value,
//! while the envelope carries the same register without the final inversion.

use crc32fast::Hasher;

/// Classic CRC-32/ISO-HDLC (initial and final XOR of `0xFFFFFFFF`).
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// CRC-32 register as left by the envelope routine, which skips the final XOR.
pub fn crc32_raw(bytes: &[u8]) -> u32 {
    !crc32(bytes)
}
