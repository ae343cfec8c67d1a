// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport scheduler (spec §4.8): picks a transport from the attached set
//! for the next send. Lock-free in the common case, grounded on the
//! teacher's atomic round-robin cursor style (`AtomicU64`-backed counters
//! throughout `reliability::seq`/`metrics`) rather than a mutex-guarded index.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::transport::TransportId;

/// Which scheduling policy a nexus uses, per the `XPORT_SCHEDULER` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerKind {
    #[default]
    RoundRobin,
    LeastQueue,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => f.write_str("ROUND_ROBIN"),
            Self::LeastQueue => f.write_str("LEAST_QUEUE"),
        }
    }
}

/// One entry in the attached-transport set a scheduler chooses among.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: TransportId,
    /// Outbound queue depth, consulted only by `LeastQueue`.
    pub queue_depth: u32,
}

/// Stateless-per-call chooser over the current attached-transport set.
/// The set itself is owned by the nexus (typically behind an
/// [`arc_swap::ArcSwap`]); the scheduler only carries the cursor needed for
/// round robin.
pub struct Scheduler {
    kind: SchedulerKind,
    cursor: AtomicUsize,
}

impl Scheduler {
    #[must_use]
    pub fn new(kind: SchedulerKind) -> Self {
        Self {
            kind,
            cursor: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SchedulerKind {
        self.kind
    }

    /// Choose one candidate from `candidates`, or `None` if empty.
    pub fn choose(&self, candidates: &[Candidate]) -> Option<TransportId> {
        if candidates.is_empty() {
            return None;
        }
        match self.kind {
            SchedulerKind::RoundRobin => {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                Some(candidates[idx].id)
            }
            SchedulerKind::LeastQueue => {
                // Ties broken by lowest TransportId for determinism.
                candidates
                    .iter()
                    .min_by_key(|c| (c.queue_depth, c.id.0))
                    .map(|c| c.id)
            }
        }
    }
}

/// Per-transport outbound queue depth counter, updated by the I/O layer and
/// read by a `LeastQueue` scheduler without locking.
#[derive(Debug, Default)]
pub struct QueueDepth(AtomicU32);

impl QueueDepth {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate { id: TransportId(1), queue_depth: 3 },
            Candidate { id: TransportId(2), queue_depth: 1 },
            Candidate { id: TransportId(3), queue_depth: 5 },
        ]
    }

    #[test]
    fn round_robin_cycles_through_all_candidates() {
        let s = Scheduler::new(SchedulerKind::RoundRobin);
        let cands = candidates();
        let picks: Vec<_> = (0..6).map(|_| s.choose(&cands).unwrap()).collect();
        assert_eq!(
            picks,
            vec![
                TransportId(1),
                TransportId(2),
                TransportId(3),
                TransportId(1),
                TransportId(2),
                TransportId(3),
            ]
        );
    }

    #[test]
    fn least_queue_picks_lowest_depth() {
        let s = Scheduler::new(SchedulerKind::LeastQueue);
        let cands = candidates();
        assert_eq!(s.choose(&cands), Some(TransportId(2)));
    }

    #[test]
    fn empty_candidate_set_yields_none() {
        let s = Scheduler::new(SchedulerKind::RoundRobin);
        assert_eq!(s.choose(&[]), None);
    }

    #[test]
    fn least_queue_ties_break_on_lowest_id() {
        let s = Scheduler::new(SchedulerKind::LeastQueue);
        let cands = vec![
            Candidate { id: TransportId(9), queue_depth: 0 },
            Candidate { id: TransportId(2), queue_depth: 0 },
        ];
        assert_eq!(s.choose(&cands), Some(TransportId(2)));
    }
}
