// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

//! Bootloader Control Block: named string fields exchanged between the bootloader, recovery and
//! the running system.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

pub const MESSAGE_SIZE: usize = 2048;

/// Named field of the [`MessageRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Command,
    Status,
    Recovery,
    Stage,
    Reserved,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Command,
        Field::Status,
        Field::Recovery,
        Field::Stage,
        Field::Reserved,
    ];

    pub const fn offset(self) -> usize {
        match self {
            Field::Command => 0,
            Field::Status => 32,
            Field::Recovery => 64,
            Field::Stage => 832,
            Field::Reserved => 864,
        }
    }

    pub const fn size(self) -> usize {
        match self {
            Field::Command | Field::Status | Field::Stage => 32,
            Field::Recovery => 768,
            Field::Reserved => 1184,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Field::Command => "command",
            Field::Status => "status",
            Field::Recovery => "recovery",
            Field::Stage => "stage",
            Field::Reserved => "reserved",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|field| field.name() == name)
            .ok_or_else(|| {
                log::debug!("Unknown bcb field '{name}'");
                Error::InvalidField(name.to_string())
            })
    }
}

/// Operator of a field test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestOp {
    /// `=`: the stored string equals the value.
    Equal,
    /// `~`: the stored string contains the value.
    Contains,
}

impl FromStr for TestOp {
    type Err = Error;

    fn from_str(op: &str) -> Result<Self> {
        match op {
            "=" => Ok(TestOp::Equal),
            "~" => Ok(TestOp::Contains),
            _ => Err(Error::InvalidOperator(op.to_string())),
        }
    }
}

/// Read-only view on one field. The content is not guaranteed to be NUL-terminated.
#[derive(Clone, Copy, Debug)]
pub struct FieldView<'a> {
    field: Field,
    raw: &'a [u8],
}

impl<'a> FieldView<'a> {
    pub fn field(&self) -> Field {
        self.field
    }

    /// Fixed size of the field on disk.
    pub fn capacity(&self) -> usize {
        self.raw.len()
    }

    /// Length of the stored string, up to the first NUL or the end of the field.
    pub fn len(&self) -> usize {
        self.raw.iter().position(|&b| b == 0).unwrap_or(self.raw.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored string without its NUL padding.
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.raw[..self.len()]
    }

    /// Whole field, padding included.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Stored string if it only holds printable ASCII and line feeds, an empty string otherwise.
    /// Line feeds are rendered as `\n`.
    pub fn printable(&self) -> String {
        let bytes = self.as_bytes();
        if bytes
            .iter()
            .all(|&b| b.is_ascii_graphic() || b == b' ' || b == b'\n')
        {
            String::from_utf8_lossy(bytes).replace('\n', "\\n")
        } else {
            String::new()
        }
    }
}

/// `struct bootloader_message`, 2 KiB.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRecord {
    bytes: [u8; MESSAGE_SIZE],
}

impl Default for MessageRecord {
    fn default() -> Self {
        Self {
            bytes: [0; MESSAGE_SIZE],
        }
    }
}

impl MessageRecord {
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        Some(Self {
            bytes: s.get(..MESSAGE_SIZE)?.try_into().ok()?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    pub fn field(&self, field: Field) -> FieldView<'_> {
        FieldView {
            field,
            raw: &self.bytes[field.offset()..field.offset() + field.size()],
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut [u8] {
        &mut self.bytes[field.offset()..field.offset() + field.size()]
    }

    /// Looks a field up by name.
    pub fn get(&self, name: &str) -> Result<FieldView<'_>> {
        Ok(self.field(name.parse()?))
    }

    /// Replaces the content of `field`. The value is truncated so that at least one NUL byte
    /// terminates the field.
    pub fn set(&mut self, field: Field, value: &[u8]) {
        let raw = self.field_mut(field);
        raw.fill(0);
        let len = value.len().min(raw.len() - 1);
        raw[..len].copy_from_slice(&value[..len]);
        log::debug!("BCB '{field}' field set to '{}'", String::from_utf8_lossy(value));
    }

    pub fn clear(&mut self, field: Field) {
        self.field_mut(field).fill(0);
        log::debug!("BCB '{field}' field cleared");
    }

    pub fn clear_all(&mut self) {
        self.bytes.fill(0);
        log::debug!("BCB 'all' field cleared");
    }

    pub fn test(&self, field: Field, op: TestOp, value: &[u8]) -> bool {
        let stored = self.field(field).as_bytes();
        match op {
            TestOp::Equal => stored == value,
            TestOp::Contains => {
                value.is_empty() || stored.windows(value.len()).any(|window| window == value)
            }
        }
    }

    pub fn dump(&self, field: Field) -> String {
        self.field(field).printable()
    }

    /// Every field but `reserved`, in layout order.
    pub fn dump_all(&self) -> Vec<(Field, String)> {
        [Field::Command, Field::Status, Field::Recovery, Field::Stage]
            .into_iter()
            .map(|field| (field, self.dump(field)))
            .collect()
    }
}
