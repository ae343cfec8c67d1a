// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-channel counters (spec §3 stats surface), grounded on
//! [`reliability::metrics::ReliableMetrics`]'s atomic-counter-plus-snapshot
//! pattern, minus that module's telemetry-frame export (out of scope here).

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one channel's lifetime. All increments use
/// relaxed ordering; a consistent point-in-time view is only promised by
/// [`ChannelStats::snapshot`], not by reading individual fields.
#[derive(Debug, Default)]
pub struct ChannelStats {
    commands_submitted: AtomicU64,
    commands_completed: AtomicU64,
    retries: AtomicU64,
    aborts_requested: AtomicU64,
    slot_failure_responses: AtomicU64,
    evictions: AtomicU64,
    protocol_violations: AtomicU64,
    transport_resets: AtomicU64,
}

/// A consistent-enough point-in-time read of [`ChannelStats`]. Not
/// transactionally consistent across fields (each is its own atomic load),
/// which matches the teacher's `ReliableMetrics::snapshot` tradeoff: cheap
/// reads over perfect cross-field consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub commands_submitted: u64,
    pub commands_completed: u64,
    pub retries: u64,
    pub aborts_requested: u64,
    pub slot_failure_responses: u64,
    pub evictions: u64,
    pub protocol_violations: u64,
    pub transport_resets: u64,
}

impl ChannelStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.commands_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abort_requested(&self) {
        self.aborts_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slot_failure_response(&self) {
        self.slot_failure_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_reset(&self) {
        self.transport_resets.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            commands_completed: self.commands_completed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            aborts_requested: self.aborts_requested.load(Ordering::Relaxed),
            slot_failure_responses: self.slot_failure_responses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            transport_resets: self.transport_resets.load(Ordering::Relaxed),
        }
    }
}
