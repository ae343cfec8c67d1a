// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Target-side slot table (spec §4.3): owns the cached response needed to
//! answer a retry without re-running the application.

use parking_lot::Mutex;

use crate::exchange::ExchangeId;
use crate::serial::SerialNumber;
use crate::slot::SlotFailure;

/// A completed command's response, retained so a retry of it can be answered
/// without re-executing the application.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub exchange_id: ExchangeId,
    pub slot_sn: SerialNumber,
    pub response: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct TargetSlot {
    /// SlotSN of the most recently accepted command over this slot (the
    /// "next expected" is this value plus one).
    slot_sn: SerialNumber,
    /// ExchangeID currently executing over this slot, if any.
    active: Option<ExchangeId>,
    cached: Option<CachedResponse>,
}

/// Result of a successful reservation: the caller must finalize `evicted`
/// (the previously cached command, if any) since its cache slot was just
/// reused.
#[derive(Debug)]
pub struct Reservation {
    pub evicted: Option<CachedResponse>,
}

struct Inner {
    slots: Vec<TargetSlot>,
    current_max: u32,
    target: u32,
    /// Set while downsizing: bit `k` records that a response has been sent
    /// over slot `k` since the downsize began, proving the peer has seen
    /// flow-control fields reflecting the new `target`.
    announced: Option<Vec<bool>>,
}

impl Inner {
    fn grow_to(&mut self, new_len: u32) {
        let new_len = new_len as usize;
        if new_len > self.slots.len() {
            self.slots.resize(new_len, TargetSlot::default());
        }
    }
}

/// Bounded table of slots the target tracks state for, keyed by the slot ID
/// the initiator chose.
pub struct TargetSlotTable {
    inner: Mutex<Inner>,
}

impl TargetSlotTable {
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        let len = capacity as usize;
        Self {
            inner: Mutex::new(Inner {
                slots: vec![TargetSlot::default(); len],
                current_max: capacity.saturating_sub(1),
                target: capacity.saturating_sub(1),
                announced: None,
            }),
        }
    }

    /// Attempt to admit `command` (identified by `exchange_id`) onto
    /// `slot_id` at `slot_sn`, with the peer's advertised
    /// `max_slot_id_in_use` for bounds checking.
    pub fn reserve(
        &self,
        slot_id: u32,
        slot_sn: SerialNumber,
        exchange_id: ExchangeId,
        max_slot_id_in_use: u32,
    ) -> Result<Reservation, SlotFailure> {
        let mut inner = self.inner.lock();

        if slot_id > inner.current_max {
            return Err(SlotFailure::SlotIdInvalid);
        }
        if max_slot_id_in_use > inner.current_max {
            return Err(SlotFailure::SlotMaxInvalid);
        }

        self.maybe_truncate_for_downsize(&mut inner, slot_id, max_slot_id_in_use);

        let expected = inner.slots[slot_id as usize].slot_sn.succ();
        let current = inner.slots[slot_id as usize].slot_sn;

        if slot_sn == expected {
            let slot = &mut inner.slots[slot_id as usize];
            let evicted = slot.cached.take();
            slot.active = Some(exchange_id);
            slot.slot_sn = slot_sn;
            Ok(Reservation { evicted })
        } else if slot_sn == current {
            let same_exchange = inner.slots[slot_id as usize]
                .cached
                .as_ref()
                .is_some_and(|c| c.exchange_id == exchange_id);
            if same_exchange {
                // True retry of the already-cached command: the caller
                // should serve the cached response, not reserve anew.
                Err(SlotFailure::SlotSeqMisordered)
            } else {
                Err(SlotFailure::SlotFalseRetry)
            }
        } else {
            Err(SlotFailure::SlotSeqMisordered)
        }
    }

    /// Fetch the cached response for a retry over `slot_id`, if its
    /// ExchangeID matches.
    pub fn cached_response(&self, slot_id: u32, exchange_id: ExchangeId) -> Option<CachedResponse> {
        let inner = self.inner.lock();
        inner.slots.get(slot_id as usize).and_then(|s| {
            s.cached
                .as_ref()
                .filter(|c| c.exchange_id == exchange_id)
                .cloned()
        })
    }

    /// Record that the application finished executing the active command on
    /// `slot_id`, caching its response for future retries.
    pub fn complete(&self, slot_id: u32, response: CachedResponse) {
        let mut inner = self.inner.lock();
        let slot = &mut inner.slots[slot_id as usize];
        slot.active = None;
        slot.cached = Some(response);
    }

    /// Begin a controlled downsize: mark `target` and allocate a fresh
    /// announcement bitmap over `[0, current_max]`, discarding any prior one.
    pub fn begin_downsize(&self, target: u32) {
        let mut inner = self.inner.lock();
        let len = inner.current_max as usize + 1;
        inner.target = target;
        inner.announced = Some(vec![false; len]);
    }

    /// Record that a response was just sent over `slot_id` while downsizing.
    pub fn mark_response_sent(&self, slot_id: u32) {
        let mut inner = self.inner.lock();
        if let Some(bits) = inner.announced.as_mut() {
            if let Some(bit) = bits.get_mut(slot_id as usize) {
                *bit = true;
            }
        }
    }

    /// Upsize takes effect immediately.
    pub fn upsize(&self, target: u32) {
        let mut inner = self.inner.lock();
        inner.grow_to(target + 1);
        inner.current_max = target;
        inner.target = target;
        inner.announced = None;
    }

    fn maybe_truncate_for_downsize(&self, inner: &mut Inner, slot_id: u32, max_slot_id_in_use: u32) {
        let Some(bits) = inner.announced.as_ref() else {
            return;
        };
        let target = inner.target;
        if max_slot_id_in_use < target && bits.get(slot_id as usize).copied().unwrap_or(false) {
            inner.slots.truncate(target as usize + 1);
            inner.current_max = target;
            inner.announced = None;
        }
    }

    #[must_use]
    pub fn current_max(&self) -> u32 {
        self.inner.lock().current_max
    }
}
