// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session FSM (spec §4.10): `Free -> Active -> LoggedIn -> (Failed <->
//! InContinue) -> Zombie`, grounded on [`transport::tcp::connection::
//! ConnectionState`]'s enum-with-predicates-and-panicking-transitions style.

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Free,
    Active,
    LoggedIn,
    Failed,
    InContinue,
    Zombie,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Zombie)
    }

    #[must_use]
    pub fn is_operational(self) -> bool {
        matches!(self, Self::LoggedIn)
    }

    /// N1: leading login in progress.
    pub fn on_login_begin(&mut self) {
        match self {
            Self::Free => *self = Self::Active,
            other => panic!("illegal session transition: on_login_begin from {other:?}"),
        }
    }

    /// N2: leading login succeeded.
    pub fn on_login_succeeded(&mut self) {
        match self {
            Self::Active => *self = Self::LoggedIn,
            other => panic!("illegal session transition: on_login_succeeded from {other:?}"),
        }
    }

    /// N9: leading login failed.
    pub fn on_leading_login_failed(&mut self) {
        match self {
            Self::Active => *self = Self::Zombie,
            other => panic!(
                "illegal session transition: on_leading_login_failed from {other:?}"
            ),
        }
    }

    /// N3: graceful close, from any non-terminal state.
    pub fn on_graceful_close(&mut self) {
        match self {
            Self::Zombie => panic!("illegal session transition: on_graceful_close from Zombie"),
            _ => *self = Self::Zombie,
        }
    }

    /// N5: last operational transport lost.
    pub fn on_last_transport_lost(&mut self) {
        match self {
            Self::LoggedIn => *self = Self::Failed,
            other => panic!(
                "illegal session transition: on_last_transport_lost from {other:?}"
            ),
        }
    }

    /// N7: a continuation (re-login on a Failed session) begins.
    pub fn on_continuation_begin(&mut self) {
        match self {
            Self::Failed => *self = Self::InContinue,
            other => panic!(
                "illegal session transition: on_continuation_begin from {other:?}"
            ),
        }
    }

    /// N8: continuation attempt failed; session remains Failed (still
    /// within its keepalive window) rather than moving to Zombie directly.
    pub fn on_continuation_failed(&mut self) {
        match self {
            Self::InContinue => *self = Self::Failed,
            other => panic!(
                "illegal session transition: on_continuation_failed from {other:?}"
            ),
        }
    }

    /// N10: continuation succeeded, session is fully restored.
    pub fn on_continuation_succeeded(&mut self) {
        match self {
            Self::InContinue => *self = Self::LoggedIn,
            other => panic!(
                "illegal session transition: on_continuation_succeeded from {other:?}"
            ),
        }
    }

    /// N6/N11: reset via keepalive timeout or reinstatement by a new
    /// leading login for the same client terminus.
    pub fn on_reset(&mut self) {
        match self {
            Self::Zombie => panic!("illegal session transition: on_reset from Zombie"),
            _ => *self = Self::Zombie,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "FREE",
            Self::Active => "ACTIVE",
            Self::LoggedIn => "LOGGED_IN",
            Self::Failed => "FAILED",
            Self::InContinue => "IN_CONTINUE",
            Self::Zombie => "ZOMBIE",
        };
        f.write_str(s)
    }
}

/// Schedules a forced transition to Zombie `MIN_KEEPALIVE_TIME` after a
/// session enters Failed; cancelled if the session leaves Failed first.
///
/// Grounded on [`reliability::reader::NackScheduler`]'s pattern of owning a
/// cancellable `tokio` timer task per tracked entity.
pub struct KeepaliveTimer {
    handle: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl KeepaliveTimer {
    /// Arm a timer of `duration`; `on_expire` runs on a spawned task if the
    /// timer is not cancelled first. Requires a `tokio` runtime context.
    pub fn arm<F>(duration: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => on_expire(),
                _ = rx => {}
            }
        });
        Self {
            handle: Some(handle),
            cancel: Some(tx),
        }
    }

    /// Cancel the timer; a no-op if it already fired.
    pub fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_login_to_logged_in() {
        let mut s = SessionState::default();
        assert_eq!(s, SessionState::Free);
        s.on_login_begin();
        assert_eq!(s, SessionState::Active);
        s.on_login_succeeded();
        assert_eq!(s, SessionState::LoggedIn);
        assert!(s.is_operational());
    }

    #[test]
    fn failed_and_continuation_cycle() {
        let mut s = SessionState::LoggedIn;
        s.on_last_transport_lost();
        assert_eq!(s, SessionState::Failed);
        s.on_continuation_begin();
        assert_eq!(s, SessionState::InContinue);
        s.on_continuation_succeeded();
        assert_eq!(s, SessionState::LoggedIn);
    }

    #[test]
    fn continuation_failure_returns_to_failed_not_zombie() {
        let mut s = SessionState::Failed;
        s.on_continuation_begin();
        s.on_continuation_failed();
        assert_eq!(s, SessionState::Failed);
    }

    #[test]
    fn reset_from_any_nonterminal_state_reaches_zombie() {
        for mut s in [
            SessionState::Free,
            SessionState::Active,
            SessionState::LoggedIn,
            SessionState::Failed,
            SessionState::InContinue,
        ] {
            s.on_reset();
            assert_eq!(s, SessionState::Zombie);
        }
    }

    #[test]
    #[should_panic(expected = "illegal session transition")]
    fn reset_from_zombie_panics() {
        let mut s = SessionState::Zombie;
        s.on_reset();
    }

    #[test]
    #[should_panic(expected = "illegal session transition")]
    fn login_succeeded_without_begin_panics() {
        let mut s = SessionState::Free;
        s.on_login_succeeded();
    }

    #[tokio::test]
    async fn keepalive_timer_fires_when_not_cancelled() {
        let (tx, rx) = oneshot::channel();
        let _timer = KeepaliveTimer::arm(Duration::from_millis(5), move || {
            let _ = tx.send(());
        });
        tokio::time::timeout(Duration::from_millis(200), rx)
            .await
            .expect("timer should have fired")
            .unwrap();
    }

    #[tokio::test]
    async fn keepalive_timer_cancel_prevents_expiry_callback() {
        let (tx, mut rx) = oneshot::channel::<()>();
        let timer = KeepaliveTimer::arm(Duration::from_millis(50), move || {
            let _ = tx.send(());
        });
        timer.cancel();
        let result = tokio::time::timeout(Duration::from_millis(100), &mut rx).await;
        assert!(result.is_err() || result.unwrap().is_err());
    }
}
