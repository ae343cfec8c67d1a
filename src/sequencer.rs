// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Target-side command sequencer (spec §4.4).
//!
//! Applies strict CommandSN ordering before dispatch, even though commands
//! arrive out of order across multiple transports. Ring-buffer position is
//! `commandSN mod depth`; ring resize is never attempted at runtime — a
//! same-position re-entry before the occupant drains is a fatal protocol
//! violation (spec §9), the sequencer analogue of
//! [`reliability::gap_tracker::GapTracker`]'s range bookkeeping but over a
//! fixed-size ring rather than an open range set.

use parking_lot::Mutex;

use crate::error::Error;
use crate::serial::SerialNumber;

/// If more than this many commands are queued and ready to drain, hand the
/// drain off to an async task instead of draining inline on the arrival
/// thread. Keeps the common single-transport in-order path at zero latency.
pub const SYNC_DRAIN_THRESHOLD: usize = 4;

/// How a caller should drain the commands `enter` released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Few enough ready commands that the caller should drain them inline.
    Inline,
    /// Enough ready commands (or a drainer is already active) that the
    /// caller should hand the drain off to an async task.
    Async,
}

/// Outcome of `enter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnterOutcome {
    /// How many contiguous positions (including the one just entered) are
    /// now ready to dispatch, starting at the pre-call `head`.
    pub drained: u32,
    pub mode: DrainMode,
    /// Ring distance from `head` at the time of entry; 0 when the command
    /// landed exactly at `head`. Used for the `orderDistance` stat.
    pub order_distance: u32,
}

struct Inner {
    occupied: Vec<bool>,
    /// CommandSN expected to occupy `head`'s ring position next.
    head: SerialNumber,
    async_drainer_active: bool,
}

/// Fixed-capacity reorder buffer keyed by `commandSN mod depth`.
pub struct Sequencer {
    depth: usize,
    inner: Mutex<Inner>,
}

impl Sequencer {
    /// `depth` is the channel's negotiated queue depth; the ring never
    /// resizes after construction.
    #[must_use]
    pub fn new(depth: usize, initial_expected: SerialNumber) -> Self {
        assert!(depth > 0, "sequencer depth must be positive");
        Self {
            depth,
            inner: Mutex::new(Inner {
                occupied: vec![false; depth],
                head: initial_expected,
                async_drainer_active: false,
            }),
        }
    }

    fn position(&self, sn: SerialNumber) -> usize {
        (sn.get() as usize) % self.depth
    }

    /// Admit a command that arrived with CommandSN `sn`. Returns how many
    /// (including this one) are now ready to dispatch in CommandSN order
    /// starting at the previous `head`, and whether the caller should drain
    /// inline or hand off to an async task.
    ///
    /// # Errors
    /// Returns [`Error::ProtocolViolation`] if `sn`'s ring position is
    /// already occupied: the ring wrapped onto its own unprocessed tail.
    pub fn enter(&self, sn: SerialNumber) -> Result<EnterOutcome, Error> {
        let mut inner = self.inner.lock();
        let pos = self.position(sn);

        if inner.occupied[pos] {
            return Err(Error::ProtocolViolation(format!(
                "sequencer ring collision at position {pos} (commandSN {sn})"
            )));
        }

        let head_pos = self.position(inner.head);
        let order_distance = ((pos + self.depth) - head_pos) % self.depth;

        if sn != inner.head {
            inner.occupied[pos] = true;
            return Ok(EnterOutcome {
                drained: 0,
                mode: DrainMode::Inline,
                order_distance: order_distance as u32,
            });
        }

        inner.occupied[pos] = true;
        let mut drained = 0u32;
        let mut cursor = inner.head;
        loop {
            let p = self.position(cursor);
            if !inner.occupied[p] {
                break;
            }
            inner.occupied[p] = false;
            drained += 1;
            cursor = cursor.succ();
        }
        inner.head = cursor;

        let mode = if drained as usize > SYNC_DRAIN_THRESHOLD || inner.async_drainer_active {
            inner.async_drainer_active = true;
            DrainMode::Async
        } else {
            DrainMode::Inline
        };

        Ok(EnterOutcome {
            drained,
            mode,
            order_distance: order_distance as u32,
        })
    }

    /// Mark that the async drainer has finished its batch.
    pub fn async_drain_complete(&self) {
        self.inner.lock().async_drainer_active = false;
    }

    #[must_use]
    pub fn head(&self) -> SerialNumber {
        self.inner.lock().head
    }
}
