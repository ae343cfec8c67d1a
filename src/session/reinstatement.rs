// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reinstatement chain flattening (spec §4.10/§9): when a predecessor
//! session being closed for reinstatement is itself superseded again
//! before it reaches Zombie, the eventual `notifyReinstated` must reach
//! the chain's current tail, not the intermediate link.

use std::collections::HashMap;

use parking_lot::Mutex;

pub type SessionId = u64;

/// One session's pointer to whichever session reinstated it, if any.
#[derive(Debug, Default)]
pub struct ReinstatementLink(Mutex<Option<SessionId>>);

impl ReinstatementLink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that this session was reinstated by `successor`.
    pub fn set_successor(&self, successor: SessionId) {
        *self.0.lock() = Some(successor);
    }

    #[must_use]
    pub fn successor(&self) -> Option<SessionId> {
        *self.0.lock()
    }
}

/// Registry of reinstatement links across live sessions, used to resolve
/// the flattened target of a `notifyReinstated` call. Owned by whatever
/// tracks sessions for a listening endpoint (a future session registry);
/// kept self-contained here so the flattening rule is independently
/// testable.
#[derive(Debug, Default)]
pub struct ReinstatementChains(Mutex<HashMap<SessionId, ReinstatementLink>>);

impl ReinstatementChains {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `predecessor` was reinstated by `successor`.
    pub fn record(&self, predecessor: SessionId, successor: SessionId) {
        self.0
            .lock()
            .entry(predecessor)
            .or_insert_with(ReinstatementLink::new)
            .set_successor(successor);
    }

    /// Walk the chain starting at `start` to the session with no recorded
    /// successor — the one that should actually receive
    /// `notifyReinstated`. Returns `start` itself if it was never
    /// superseded again.
    #[must_use]
    pub fn resolve_tail(&self, start: SessionId) -> SessionId {
        let chains = self.0.lock();
        let mut current = start;
        let mut visited = std::collections::HashSet::new();
        while let Some(link) = chains.get(&current) {
            if !visited.insert(current) {
                break; // defensive: never loop forever on a malformed chain
            }
            match link.successor() {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }
}
