// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Target-side command lifecycle (spec §4.6): 8 states, transitions listed
//! explicitly in the spec table. Any other transition is a programming
//! error in the channel dispatcher, not a recoverable protocol event, so it
//! panics rather than returning a `Result` — mirroring
//! [`transport::tcp::connection::ConnectionState`](crate::transport::tcp::connection::ConnectionState)'s
//! treatment of illegal edges.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetCommandState {
    #[default]
    Initial,
    Pending,
    Active,
    /// Response has been handed to the channel for dispatch but not yet
    /// acknowledged complete; the quiescent state a command spends most of
    /// its post-execution life in.
    InDoubt,
    /// A duplicate (retry) request arrived while `InDoubt`; draining its
    /// queued instances before returning to `InDoubt`.
    Retry,
    /// A task-management request is being answered.
    Abort,
    /// Task-management response has been sent.
    Aborted,
    /// Terminal: evicted by the next command reusing this slot.
    Final,
}

impl TargetCommandState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Final)
    }

    /// The command's request frame entered the sequencer.
    ///
    /// # Panics
    /// If not called from `Initial`.
    #[must_use]
    pub fn on_sequencer_enter(self) -> Self {
        match self {
            Self::Initial => Self::Pending,
            other => panic!("illegal target command transition: on_sequencer_enter from {other:?}"),
        }
    }

    /// The sequencer released this command's position; it is ready to run.
    ///
    /// # Panics
    /// If not called from `Pending`.
    #[must_use]
    pub fn on_sequencer_release(self) -> Self {
        match self {
            Self::Pending => Self::Active,
            other => panic!("illegal target command transition: on_sequencer_release from {other:?}"),
        }
    }

    /// A task-management request targeting this command arrived.
    ///
    /// # Panics
    /// If not called from `Pending` or `InDoubt`.
    #[must_use]
    pub fn on_taskmgmt_arrival(self) -> Self {
        match self {
            Self::Pending | Self::InDoubt => Self::Abort,
            other => panic!("illegal target command transition: on_taskmgmt_arrival from {other:?}"),
        }
    }

    /// The application finished executing and a response was handed to the
    /// channel for dispatch.
    ///
    /// # Panics
    /// If not called from `Active`.
    #[must_use]
    pub fn on_response_dispatched(self) -> Self {
        match self {
            Self::Active => Self::InDoubt,
            other => panic!("illegal target command transition: on_response_dispatched from {other:?}"),
        }
    }

    /// A slot-level failure was detected before the application ran.
    ///
    /// # Panics
    /// If not called from `Active`.
    #[must_use]
    pub fn on_slot_failure(self) -> Self {
        match self {
            Self::Active => Self::Final,
            other => panic!("illegal target command transition: on_slot_failure from {other:?}"),
        }
    }

    /// A duplicate (retry) request arrived for this already-answered
    /// command.
    ///
    /// # Panics
    /// If not called from `InDoubt`.
    #[must_use]
    pub fn on_retry_arrival(self) -> Self {
        match self {
            Self::InDoubt => Self::Retry,
            other => panic!("illegal target command transition: on_retry_arrival from {other:?}"),
        }
    }

    /// The retry queue drained with no abort pending.
    ///
    /// # Panics
    /// If not called from `Retry`.
    #[must_use]
    pub fn on_retry_drained(self) -> Self {
        match self {
            Self::Retry => Self::InDoubt,
            other => panic!("illegal target command transition: on_retry_drained from {other:?}"),
        }
    }

    /// The retry queue drained but an abort is pending.
    ///
    /// # Panics
    /// If not called from `Retry`.
    #[must_use]
    pub fn on_retry_drained_with_pending_abort(self) -> Self {
        match self {
            Self::Retry => Self::Abort,
            other => panic!(
                "illegal target command transition: on_retry_drained_with_pending_abort from {other:?}"
            ),
        }
    }

    /// The task-management response was sent.
    ///
    /// # Panics
    /// If not called from `Abort`.
    #[must_use]
    pub fn on_taskmgmt_response_sent(self) -> Self {
        match self {
            Self::Abort => Self::Aborted,
            other => panic!("illegal target command transition: on_taskmgmt_response_sent from {other:?}"),
        }
    }

    /// A new task-management request arrived (client retry of the abort).
    ///
    /// # Panics
    /// If not called from `Aborted`.
    #[must_use]
    pub fn on_taskmgmt_retry(self) -> Self {
        match self {
            Self::Aborted => Self::Abort,
            other => panic!("illegal target command transition: on_taskmgmt_retry from {other:?}"),
        }
    }

    /// Evicted because the next command reused this slot.
    ///
    /// # Panics
    /// If not called from `InDoubt` or `Aborted`.
    #[must_use]
    pub fn on_eviction(self) -> Self {
        match self {
            Self::InDoubt | Self::Aborted => Self::Final,
            other => panic!("illegal target command transition: on_eviction from {other:?}"),
        }
    }
}

impl fmt::Display for TargetCommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "Initial",
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::InDoubt => "InDoubt",
            Self::Retry => "Retry",
            Self::Abort => "Abort",
            Self::Aborted => "Aborted",
            Self::Final => "Final",
        };
        f.write_str(s)
    }
}
