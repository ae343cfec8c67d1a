// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Top-level error taxonomy for the session protocol.

use std::fmt;

use crate::session::LoginFailure;
use crate::slot::SlotFailure;

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced to callers of the session protocol.
///
/// Mirrors the taxonomy of the wire protocol: most variants carry enough
/// structure for a caller to decide whether to retry, escalate, or give up.
#[derive(Debug)]
pub enum Error {
    /// Unexpected frame kind, CommandSN beyond MaximumCommandSN, a duplicate
    /// sequencer slot, or SlotSN regression. Fatal to the transport that
    /// produced it; the session continues on any other attached transport.
    ProtocolViolation(String),

    /// A send or receive on a transport failed. Recoverable at the session
    /// level via retry over another attached transport.
    TransportReset { detail: String },

    /// Slot-level rejection reported in a CommandResponse.
    SlotFailure(SlotFailure),

    /// Login sequence failed to establish a session or transport.
    LoginFailure(LoginFailure),

    /// Result of a task-management (abort) request.
    TaskMgmt(TaskMgmtStatus),

    /// Application-level failure carried end-to-end in a response.
    ServiceException { code: i32, message: String },

    /// No slot available within the configured admission window.
    SlotTableExhausted,

    /// Command was cancelled locally before being made wire-visible.
    Cancelled,

    /// The session is not in a state that allows the requested operation.
    SessionNotReady,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation(detail) => write!(f, "protocol violation: {detail}"),
            Self::TransportReset { detail } => write!(f, "transport reset: {detail}"),
            Self::SlotFailure(status) => write!(f, "slot failure: {status}"),
            Self::LoginFailure(status) => write!(f, "login failure: {status}"),
            Self::TaskMgmt(status) => write!(f, "task management: {status}"),
            Self::ServiceException { code, message } => {
                write!(f, "service exception {code}: {message}")
            }
            Self::SlotTableExhausted => write!(f, "no slot available"),
            Self::Cancelled => write!(f, "command cancelled before transmission"),
            Self::SessionNotReady => write!(f, "session is not ready for this operation"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SlotFailure> for Error {
    fn from(status: SlotFailure) -> Self {
        Self::SlotFailure(status)
    }
}

impl From<LoginFailure> for Error {
    fn from(status: LoginFailure) -> Self {
        Self::LoginFailure(status)
    }
}

/// Outcome of a task-management (abort) request, per spec §4.5/§7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskMgmtStatus {
    /// The command had not yet started executing when it was aborted.
    AbortedBeforeStart,
    /// The command was executing when it was aborted.
    AbortedAfterStart,
    /// The command had already completed; the abort was a no-op.
    AlreadyCompleted,
    /// The command's slot failed (eviction, misorder) before it could run.
    AbortedSlotFailure,
}

impl fmt::Display for TaskMgmtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AbortedBeforeStart => "aborted before start",
            Self::AbortedAfterStart => "aborted after start",
            Self::AlreadyCompleted => "already completed",
            Self::AbortedSlotFailure => "aborted (slot failure)",
        };
        f.write_str(s)
    }
}
