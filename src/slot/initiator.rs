// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Initiator-side slot table (spec §4.2).

use parking_lot::Mutex;

use crate::exchange::ExchangeId;
use crate::serial::SerialNumber;
use crate::slot::ReserveError;

/// One initiator-side slot.
///
/// Invariant: `last_confirmed_sn <= slot_sn`, and they differ by at most one.
/// `advance()` sets `slot_sn = last_confirmed_sn + 1`; `confirm()` catches
/// `last_confirmed_sn` up; `rollback()` undoes an `advance()` that was never
/// confirmed.
#[derive(Debug, Clone, Copy)]
struct Slot {
    slot_sn: SerialNumber,
    last_confirmed_sn: SerialNumber,
    command: Option<ExchangeId>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            slot_sn: SerialNumber::ZERO,
            last_confirmed_sn: SerialNumber::ZERO,
            command: None,
        }
    }

    fn is_confirmed(&self) -> bool {
        self.slot_sn == self.last_confirmed_sn
    }
}

struct Inner {
    slots: Vec<Slot>,
    /// Bit `i` set means slot `i` is currently reserved.
    reserved: Vec<bool>,
    /// Highest slot ID the table may currently hold (`len - 1`).
    current_max: u32,
    /// Target size during a controlled downsize; `target <= current_max`.
    target: u32,
}

impl Inner {
    fn grow_to(&mut self, new_len: u32) {
        let new_len = new_len as usize;
        if new_len > self.slots.len() {
            self.slots.resize(new_len, Slot::new());
            self.reserved.resize(new_len, false);
        }
    }

    fn try_shrink(&mut self) {
        if self.slots.len() as u32 <= self.target + 1 {
            return;
        }
        let any_reserved_above_target = self.reserved[(self.target as usize + 1)..]
            .iter()
            .any(|&r| r);
        if !any_reserved_above_target {
            self.slots.truncate(self.target as usize + 1);
            self.reserved.truncate(self.target as usize + 1);
            self.current_max = self.target;
        }
    }
}

/// Bounded table of slots the initiator may reserve for outstanding commands.
///
/// Thread-safe: `reserve`/`release`/`resize` all take the single internal
/// lock, matching the teacher's per-channel coarse-lock style
/// ([`reliability::history_cache::HistoryCache`]'s `Mutex<VecDeque<_>>`)
/// rather than per-slot locking, since reservation inherently touches the
/// shared bitmap.
pub struct InitiatorSlotTable {
    inner: Mutex<Inner>,
}

impl InitiatorSlotTable {
    /// Build a table with `capacity` slots, all initially free.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        let len = capacity as usize;
        Self {
            inner: Mutex::new(Inner {
                slots: vec![Slot::new(); len],
                reserved: vec![false; len],
                current_max: capacity.saturating_sub(1),
                target: capacity.saturating_sub(1),
            }),
        }
    }

    /// Reserve the least-significant clear bit `<= target`, advance that
    /// slot's SlotSN, and attach `command`. Returns the slot ID and the
    /// SlotSN the command must stamp on the wire.
    pub fn reserve(&self, command: ExchangeId) -> Result<(u32, SerialNumber), ReserveError> {
        let mut inner = self.inner.lock();
        let target = inner.target;
        let free = inner.reserved[..=(target as usize)]
            .iter()
            .position(|&r| !r)
            .map(|idx| idx as u32);
        let Some(slot_id) = free else {
            return Err(ReserveError::Unavailable);
        };
        inner.reserved[slot_id as usize] = true;
        let slot = &mut inner.slots[slot_id as usize];
        slot.slot_sn = slot.last_confirmed_sn.succ();
        slot.command = Some(command);
        Ok((slot_id, slot.slot_sn))
    }

    /// Mark the slot confirmed (peer accepted it): `last_confirmed_sn =
    /// slot_sn`.
    pub fn confirm(&self, slot_id: u32) {
        let mut inner = self.inner.lock();
        let slot = &mut inner.slots[slot_id as usize];
        slot.last_confirmed_sn = slot.slot_sn;
    }

    /// Undo a reservation the peer rejected: `slot_sn = last_confirmed_sn`.
    pub fn rollback(&self, slot_id: u32) {
        let mut inner = self.inner.lock();
        let slot = &mut inner.slots[slot_id as usize];
        slot.slot_sn = slot.last_confirmed_sn;
    }

    /// Release a confirmed slot back to the free pool. Panics if the slot is
    /// not confirmed — releasing an unconfirmed slot would let a future
    /// reservation lose the pending command's retry linkage.
    pub fn release(&self, slot_id: u32) {
        let mut inner = self.inner.lock();
        {
            let slot = &inner.slots[slot_id as usize];
            assert!(
                slot.is_confirmed(),
                "release of unconfirmed slot {slot_id}"
            );
        }
        inner.reserved[slot_id as usize] = false;
        inner.slots[slot_id as usize].command = None;
        if slot_id > inner.target {
            inner.try_shrink();
        }
    }

    /// Apply a resize carried in a peer response: `(current_max, target)`.
    /// Growing is immediate; shrinking only marks intent, actually
    /// truncating lazily as slots above `target` are released.
    pub fn resize(&self, current_max: u32, target: u32) {
        let mut inner = self.inner.lock();
        if target + 1 > inner.slots.len() as u32 {
            inner.grow_to(target + 1);
        }
        inner.current_max = current_max;
        inner.target = target;
        inner.try_shrink();
    }

    #[must_use]
    pub fn current_max(&self) -> u32 {
        self.inner.lock().current_max
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xid(n: u64) -> ExchangeId {
        ExchangeId(n)
    }

    #[test]
    fn reserve_assigns_least_significant_free_slot() {
        let table = InitiatorSlotTable::new(4);
        let (slot0, sn0) = table.reserve(xid(1)).unwrap();
        assert_eq!(slot0, 0);
        assert_eq!(sn0, SerialNumber::new(1));
        let (slot1, _) = table.reserve(xid(2)).unwrap();
        assert_eq!(slot1, 1);
    }

    #[test]
    fn reservation_fails_when_exhausted() {
        let table = InitiatorSlotTable::new(2);
        table.reserve(xid(1)).unwrap();
        table.reserve(xid(2)).unwrap();
        assert_eq!(table.reserve(xid(3)), Err(ReserveError::Unavailable));
    }

    #[test]
    fn release_requires_confirmation() {
        let table = InitiatorSlotTable::new(1);
        let (slot, _) = table.reserve(xid(1)).unwrap();
        table.confirm(slot);
        table.release(slot);
        // slot is free again
        let (slot2, sn2) = table.reserve(xid(2)).unwrap();
        assert_eq!(slot2, slot);
        assert_eq!(sn2, SerialNumber::new(2));
    }

    #[test]
    #[should_panic(expected = "release of unconfirmed slot")]
    fn release_of_unconfirmed_slot_panics() {
        let table = InitiatorSlotTable::new(1);
        let (slot, _) = table.reserve(xid(1)).unwrap();
        table.release(slot);
    }

    #[test]
    fn rollback_reverses_advance() {
        let table = InitiatorSlotTable::new(1);
        let (slot, sn) = table.reserve(xid(1)).unwrap();
        assert_eq!(sn, SerialNumber::new(1));
        table.rollback(slot);
        // Reserving the same slot again should reuse the same SlotSN.
        let (_, sn_again) = table.reserve(xid(2)).unwrap();
        assert_eq!(sn_again, SerialNumber::new(1));
    }

    #[test]
    fn downsize_only_truncates_once_upper_slots_are_released() {
        let table = InitiatorSlotTable::new(4);
        let (s0, _) = table.reserve(xid(1)).unwrap();
        let (s1, _) = table.reserve(xid(2)).unwrap();
        let (s2, _) = table.reserve(xid(3)).unwrap();
        table.resize(3, 1);
        assert_eq!(table.capacity(), 4, "slot 2 still reserved above target");
        table.confirm(s2);
        table.release(s2);
        assert_eq!(table.capacity(), 2, "shrink happens lazily on release");
        table.confirm(s0);
        table.confirm(s1);
        table.release(s0);
        table.release(s1);
    }

    #[test]
    fn upsize_is_immediate() {
        let table = InitiatorSlotTable::new(2);
        table.resize(5, 5);
        assert_eq!(table.capacity(), 6);
        assert_eq!(table.current_max(), 5);
    }
}
