// Copyright (C) 2025 Intel Corporation
// SPDX-License-Identifier: MIT

use super::{Candidate, DirectStore, RedundantStore, Side, Validity, select};
use crate::Error;
use crate::device::sim::{MemDisk, SimFlash};
use crate::record::control::Slot;
use crate::record::message::Field;
use crate::record::{ENVELOPE_SIZE, Envelope, Section};

const OFFSET: usize = 512;
const DISK_SIZE: usize = 8192;

fn sample() -> Envelope {
    Envelope::from_slice(&std::fs::read("tests/samples/misc_ab.bin").unwrap()).unwrap()
}

/// Sealed envelope with the given epoch, carrying `stage` as a marker.
fn copy(epoch: u8, stage: &[u8]) -> Envelope {
    let mut envelope = sample();
    envelope.flags = epoch;
    envelope.message.set(Field::Stage, stage);
    envelope.seal_crc();
    envelope
}

fn disk(envelope: &Envelope) -> MemDisk {
    MemDisk::with_content(OFFSET, &envelope.to_bytes(), DISK_SIZE)
}

fn store(primary: MemDisk, secondary: MemDisk) -> RedundantStore<MemDisk> {
    RedundantStore::new(primary, secondary, OFFSET as u64)
}

fn valid(epoch: u8) -> Option<Candidate> {
    Some(Candidate {
        crc_ok: true,
        epoch,
    })
}

fn corrupted(epoch: u8) -> Option<Candidate> {
    Some(Candidate {
        crc_ok: false,
        epoch,
    })
}

#[test]
fn select_by_epoch() {
    assert_eq!(select(valid(5), valid(9)).unwrap(), Side::Secondary);
    assert_eq!(select(valid(9), valid(5)).unwrap(), Side::Primary);
    assert_eq!(select(valid(255), valid(0)).unwrap(), Side::Secondary);
    assert_eq!(select(valid(0), valid(255)).unwrap(), Side::Primary);
    assert_eq!(select(valid(3), valid(3)).unwrap(), Side::Primary);
}

#[test]
fn select_by_trust() {
    assert_eq!(select(valid(1), corrupted(200)).unwrap(), Side::Primary);
    assert_eq!(select(corrupted(200), valid(1)).unwrap(), Side::Secondary);
    assert_eq!(select(corrupted(4), corrupted(6)).unwrap(), Side::Secondary);

    assert_eq!(select(None, corrupted(6)).unwrap(), Side::Secondary);
    assert_eq!(select(valid(6), None).unwrap(), Side::Primary);
    assert!(matches!(select(None, None), Err(Error::NoValidCopy)));
}

#[test]
fn load_newest_copy() {
    let mut store = store(disk(&copy(5, b"old")), disk(&copy(9, b"new")));

    let envelope = store.load().unwrap();
    assert_eq!(envelope.message.field(Field::Stage).as_bytes(), b"new");
    assert_eq!(store.validity(), Validity::SecondaryValid);
    assert_eq!(store.epoch(), 9);
}

#[test]
fn load_epoch_wrap() {
    let mut store = store(disk(&copy(255, b"old")), disk(&copy(0, b"new")));

    let envelope = store.load().unwrap();
    assert_eq!(envelope.message.field(Field::Stage).as_bytes(), b"new");
    assert_eq!(store.epoch(), 0);
}

#[test]
fn load_skips_corrupted_copy() {
    let mut newer = copy(9, b"new");
    newer.crc32 ^= 1;
    let mut store = store(disk(&copy(5, b"old")), disk(&newer));

    let envelope = store.load().unwrap();
    assert_eq!(envelope.message.field(Field::Stage).as_bytes(), b"old");
    assert_eq!(store.validity(), Validity::PrimaryValid);
}

#[test]
fn load_one_unreadable_copy() {
    let mut primary = disk(&copy(9, b"new"));
    primary.fail_reads = true;
    let mut store = store(primary, disk(&copy(5, b"old")));

    let envelope = store.load().unwrap();
    assert_eq!(envelope.message.field(Field::Stage).as_bytes(), b"old");
    assert_eq!(store.validity(), Validity::SecondaryValid);
}

#[test]
fn load_short_copy() {
    let mut secondary = disk(&copy(9, b"new"));
    secondary.short_transfers = Some(ENVELOPE_SIZE / 2);
    let mut store = store(disk(&copy(5, b"old")), secondary);

    let envelope = store.load().unwrap();
    assert_eq!(envelope.message.field(Field::Stage).as_bytes(), b"old");
}

#[test]
fn load_nothing_readable() {
    let mut primary = MemDisk::new(DISK_SIZE);
    let mut secondary = MemDisk::new(DISK_SIZE);
    primary.fail_reads = true;
    secondary.fail_reads = true;
    let mut store = store(primary, secondary);

    assert!(matches!(store.load(), Err(Error::NoValidCopy)));
    assert_eq!(store.validity(), Validity::Invalid);
}

#[test]
fn store_alternates_copies() {
    let mut store = store(disk(&copy(5, b"old")), disk(&copy(9, b"new")));
    let mut envelope = store.load().unwrap();

    envelope.message.set(Field::Stage, b"newer");
    store.store(&mut envelope, false).unwrap();
    assert_eq!(envelope.flags, 10);
    assert!(envelope.verify_crc());
    assert_eq!(store.validity(), Validity::PrimaryValid);
    assert_eq!(store.primary.writes, 1);
    assert_eq!(store.secondary.writes, 0);
    assert_eq!(
        &store.primary.data[OFFSET..OFFSET + ENVELOPE_SIZE],
        &envelope.to_bytes()[..]
    );

    store.store(&mut envelope, false).unwrap();
    assert_eq!(envelope.flags, 11);
    assert_eq!(store.validity(), Validity::SecondaryValid);
    assert_eq!(store.secondary.writes, 1);

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded, envelope);
    assert_eq!(store.epoch(), 11);
}

#[test]
fn store_epoch_wraps() {
    let mut store = store(disk(&copy(255, b"a")), disk(&copy(254, b"b")));
    let mut envelope = store.load().unwrap();

    store.store(&mut envelope, false).unwrap();
    assert_eq!(envelope.flags, 0);
    assert_eq!(store.validity(), Validity::SecondaryValid);

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.flags, 0);
    assert_eq!(store.validity(), Validity::SecondaryValid);
}

#[test]
fn store_sync() {
    let mut store = store(disk(&copy(1, b"a")), disk(&copy(2, b"b")));
    let mut envelope = store.load().unwrap();

    store.store(&mut envelope, true).unwrap();
    assert_eq!(store.primary.data, store.secondary.data);
    assert_eq!(store.validity(), Validity::PrimaryValid);
}

#[test]
fn store_without_valid_copy() {
    let mut store = store(MemDisk::new(DISK_SIZE), MemDisk::new(DISK_SIZE));
    let mut envelope = Envelope::default();

    store.store(&mut envelope, false).unwrap();
    assert_eq!(envelope.flags, 1);
    assert_eq!(store.validity(), Validity::PrimaryValid);
    assert_eq!(store.primary.writes, 1);
    assert_eq!(store.secondary.writes, 0);
}

#[test]
fn store_write_failure() {
    let mut store = store(disk(&copy(5, b"a")), disk(&copy(4, b"b")));
    let mut envelope = store.load().unwrap();
    store.secondary.fail_writes = true;

    assert!(matches!(store.store(&mut envelope, false), Err(Error::Io(_))));
    // The authoritative copy did not move.
    assert_eq!(store.validity(), Validity::PrimaryValid);
    assert_eq!(store.epoch(), 5);
}

#[test]
fn store_on_flash() {
    let mut primary = SimFlash::nand(8, 2048, 512);
    let mut secondary = SimFlash::nand(8, 2048, 512);
    primary.mark_bad(&[0]);
    secondary.mark_bad(&[1]);
    let mut store = RedundantStore::new(primary, secondary, 0);
    let mut envelope = sample();

    store.store(&mut envelope, true).unwrap();
    let reloaded = store.load().unwrap();
    assert_eq!(reloaded, envelope);
    assert_eq!(store.primary.bad_accesses, 0);
    assert_eq!(store.secondary.bad_accesses, 0);
    assert_eq!(store.primary.erased, [2048, 4096]);
    assert_eq!(store.secondary.erased, [0, 4096]);
}

#[test]
fn direct_store() {
    let envelope = copy(3, b"old");
    let mut store = DirectStore::new(disk(&envelope), OFFSET as u64, false);
    let mut loaded = store.load().unwrap();
    assert_eq!(loaded, envelope);

    loaded.message.set(Field::Command, b"boot-fastboot");
    assert!(matches!(
        store.store(&loaded, Section::Message),
        Err(Error::DirectWriteNotAllowed)
    ));
    assert_eq!(store.device.writes, 0);

    store.allow_write = true;
    store.store(&loaded, Section::Message).unwrap();
    assert_eq!(store.device.writes, 1);

    // Only the message area was rewritten, the epoch and the CRC are untouched.
    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.message.field(Field::Command).as_bytes(), b"boot-fastboot");
    assert_eq!(reloaded.flags, 3);
    assert_eq!(reloaded.crc32, envelope.crc32);
}

#[test]
fn direct_store_control_on_flash() {
    let sample = copy(3, b"old").to_bytes();
    let mut flash = SimFlash::nand(8, 2048, 512);
    flash.mark_bad(&[1]);
    // Logical block 1 lives in physical block 2.
    flash.data[..2048].copy_from_slice(&sample[..2048]);
    flash.data[4096..6144].copy_from_slice(&sample[2048..]);
    let mut store = DirectStore::new(flash, 0, true);

    let mut envelope = store.load().unwrap();
    let mut control = envelope.control_record().unwrap();
    control.mark_active(Slot::B).unwrap();
    control.seal_crc();
    envelope.set_control_record(&control);
    store.store(&envelope, Section::Control).unwrap();

    let flash = &store.device;
    assert_eq!(flash.erased, [4096]);
    assert_eq!(flash.bad_accesses, 0);
    assert_eq!(&flash.data[..2048], &sample[..2048]);
    assert_eq!(&flash.data[4096..4128], &control.to_bytes()[..]);
    assert_eq!(&flash.data[4128..6144], &sample[2080..]);

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.control_record().unwrap(), control);
    assert_eq!(reloaded.flags, 3);
    assert_eq!(reloaded.crc32, copy(3, b"old").crc32);
}
