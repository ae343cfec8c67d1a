// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport lifecycle FSM (spec §4.9) and recovery backoff, the latter
//! grounded on [`reliability::reader::NackScheduler`]'s exponential-backoff
//! bookkeeping (`retry_count`, doubling `backoff`, reset after a cap).

use std::fmt;
use std::time::Duration;

/// Transport lifecycle state. Initiator and target run isomorphic FSMs; the
/// spec names the pre-login state `XptWait` on the initiator and `XptUp` on
/// the target, but the state plays the same role on both sides, so one
/// variant (`Connecting`) covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    #[default]
    Free,
    /// Socket established, login not yet begun.
    Connecting,
    /// Login exchange (Connect/Authenticate/Negotiate) in progress.
    InLogin,
    /// Operational: the only state that participates in the data path.
    LoggedIn,
    InLogout,
}

impl TransportState {
    #[must_use]
    pub fn is_operational(self) -> bool {
        matches!(self, Self::LoggedIn)
    }

    /// Socket connect completed.
    ///
    /// # Panics
    /// If not called from `Free`.
    #[must_use]
    pub fn on_connected(self) -> Self {
        match self {
            Self::Free => Self::Connecting,
            other => panic!("illegal transport transition: on_connected from {other:?}"),
        }
    }

    /// Login exchange begins.
    ///
    /// # Panics
    /// If not called from `Connecting`.
    #[must_use]
    pub fn on_login_begin(self) -> Self {
        match self {
            Self::Connecting => Self::InLogin,
            other => panic!("illegal transport transition: on_login_begin from {other:?}"),
        }
    }

    /// Login exchange succeeded.
    ///
    /// # Panics
    /// If not called from `InLogin`.
    #[must_use]
    pub fn on_login_succeeded(self) -> Self {
        match self {
            Self::InLogin => Self::LoggedIn,
            other => panic!("illegal transport transition: on_login_succeeded from {other:?}"),
        }
    }

    /// Graceful logout begins.
    ///
    /// # Panics
    /// If not called from `LoggedIn`.
    #[must_use]
    pub fn on_logout_begin(self) -> Self {
        match self {
            Self::LoggedIn => Self::InLogout,
            other => panic!("illegal transport transition: on_logout_begin from {other:?}"),
        }
    }

    /// Logout completed; transport returns to the free pool (or retires).
    ///
    /// # Panics
    /// If not called from `InLogout`.
    #[must_use]
    pub fn on_logout_complete(self) -> Self {
        match self {
            Self::InLogout => Self::Free,
            other => panic!("illegal transport transition: on_logout_complete from {other:?}"),
        }
    }

    /// Failure from any state always falls straight back to `Free`.
    #[must_use]
    pub fn on_failure(self) -> Self {
        Self::Free
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "Free",
            Self::Connecting => "Connecting",
            Self::InLogin => "InLogin",
            Self::LoggedIn => "LoggedIn",
            Self::InLogout => "InLogout",
        };
        f.write_str(s)
    }
}

/// Whether a transport closure can be followed by reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recoverability {
    Recoverable,
    /// Peer responded `SERVICE_UNREACHABLE`: do not retry this address.
    Terminal,
}

/// Exponential backoff for transport recovery attempts: `delay_i =
/// min(2^(i-1) * interval, timeout)`.
#[derive(Debug, Clone)]
pub struct RecoveryBackoff {
    attempt: u32,
    interval: Duration,
    timeout: Duration,
}

impl RecoveryBackoff {
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            attempt: 0,
            interval,
            timeout,
        }
    }

    /// Compute the delay before the next recovery attempt and advance the
    /// attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        let scale = 1u64.checked_shl(self.attempt - 1).unwrap_or(u64::MAX);
        let scaled = self.interval.saturating_mul(scale as u32).min(self.timeout);
        scaled
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_round_trip() {
        let s = TransportState::Free
            .on_connected()
            .on_login_begin()
            .on_login_succeeded();
        assert_eq!(s, TransportState::LoggedIn);
        assert!(s.is_operational());
        let s = s.on_logout_begin().on_logout_complete();
        assert_eq!(s, TransportState::Free);
    }

    #[test]
    fn failure_from_any_state_returns_to_free() {
        assert_eq!(TransportState::InLogin.on_failure(), TransportState::Free);
        assert_eq!(TransportState::LoggedIn.on_failure(), TransportState::Free);
    }

    #[test]
    #[should_panic(expected = "illegal transport transition")]
    fn login_without_connect_panics() {
        let _ = TransportState::Free.on_login_begin();
    }

    #[test]
    fn backoff_doubles_and_caps_at_timeout() {
        let mut backoff = RecoveryBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1), "capped at timeout");
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }
}
