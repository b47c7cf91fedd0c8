// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

use bootloader_message::Result;
use bootloader_message::prelude::*;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Store a value in a field
    Set { field: Field, value: String },
    /// Clear one field, or the whole message
    Clear { field: Option<Field> },
    /// Exit with success if the field matches the value (`=` exact, `~` substring)
    Test {
        field: Field,
        op: TestOp,
        value: String,
    },
    /// Print one field, or every field but the reserved area
    Dump { field: Option<Field> },
}

/// Runs `command` and returns whether it succeeded.
pub fn run(misc: &mut Misc, command: Command) -> Result<bool> {
    match command {
        Command::Set { field, value } => {
            misc.message_mut().set(field, value.as_bytes());
            misc.commit()?;
        }
        Command::Clear { field } => {
            match field {
                Some(field) => misc.message_mut().clear(field),
                None => misc.message_mut().clear_all(),
            }
            misc.commit()?;
        }
        Command::Test { field, op, value } => {
            let matched = misc.message().test(field, op, value.as_bytes());
            log::debug!("{field} {op:?} '{value}': {matched}");
            return Ok(matched);
        }
        Command::Dump { field: Some(field) } => println!("{}", misc.message().dump(field)),
        Command::Dump { field: None } => {
            for (field, text) in misc.message().dump_all() {
                println!("{field}: {text}");
            }
        }
    }

    Ok(true)
}
