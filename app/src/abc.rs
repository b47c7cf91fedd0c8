// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT


use bootloader_message::Result;
use bootloader_message::prelude::*;
use clap::Subcommand;
use std::io;

#[derive(Subcommand)]
pub enum Command {
    /// Print the number of slots
    Count,
    /// Print the active slot
    Current,
    /// Print the partition suffix of a slot
    Suffix { slot: Option<Slot> },
    /// Mark a slot as successfully booted
    MarkSuccessful { slot: Option<Slot> },
    /// Make a slot the next one to boot
    MarkActive { slot: Option<Slot> },
    /// Mark a slot as unbootable
    MarkUnbootable { slot: Option<Slot> },
    /// Exit with success if the slot is bootable
    IsBootable { slot: Option<Slot> },
    /// Exit with success if the slot booted successfully
    IsSuccessful { slot: Option<Slot> },
    /// Print the slot information
    Dump {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset the control record to its default layout
    Default,
}

/// Slot given on the command line, or the active one.
fn slot_or_active(misc: &Misc, slot: Option<Slot>) -> Result<Slot> {
    match slot {
        Some(slot) => Ok(slot),
        None => misc.active_slot(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn dump(control: &ControlRecord) {
    match control.active_slot() {
        Ok(slot) => println!("Active slot: {slot}"),
        Err(_) => println!("Active slot: none"),
    }
    println!("Recovery tries remaining: {}", control.recovery_tries_remaining);

    for (slot, meta) in control.slots() {
        println!(
            "Slot {slot} ({}): priority {}, tries remaining {}, successful {}, verity corrupted {}",
            slot.suffix(),
            meta.priority,
            meta.tries_remaining,
            yes_no(meta.successful_boot),
            yes_no(meta.verity_corrupted),
        );
    }
}

fn dump_json(control: &ControlRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(&control.to_json()).map_err(io::Error::from)?)
}

/// Runs `command` and returns whether it succeeded.
pub fn run(misc: &mut Misc, command: Command) -> Result<bool> {
    match command {
        Command::Count => println!("{}", misc.control()?.slot_count()),
        Command::Current => println!("{}", misc.active_slot()?),
        Command::Suffix { slot } => {
            let slot = slot_or_active(misc, slot)?;
            misc.control()?.slot(slot)?;
            println!("{}", slot.suffix());
        }
        Command::MarkSuccessful { slot } => {
            let slot = slot_or_active(misc, slot)?;
            misc.mark(SlotMark::Successful, slot)?;
            misc.commit()?;
        }
        Command::MarkActive { slot } => {
            let slot = slot_or_active(misc, slot)?;
            misc.mark(SlotMark::Active, slot)?;
            misc.commit()?;
        }
        Command::MarkUnbootable { slot } => {
            let slot = slot_or_active(misc, slot)?;
            misc.mark(SlotMark::Unbootable, slot)?;
            misc.commit()?;
        }
        Command::IsBootable { slot } => {
            let slot = slot_or_active(misc, slot)?;
            return misc.control()?.is_bootable(slot);
        }
        Command::IsSuccessful { slot } => {
            let slot = slot_or_active(misc, slot)?;
            return misc.control()?.is_successful(slot);
        }
        Command::Dump { json } => {
            let control = misc.control()?;
            if json {
                println!("{}", dump_json(&control)?);
            } else {
                dump(&control);
            }
        }
        Command::Default => {
            misc.generate_default();
            misc.commit()?;
        }
    }

    Ok(true)
}
