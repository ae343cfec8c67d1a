// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport: one underlying byte-stream connection, its FSM, and the
//! scheduler that spreads sends across the attached set (spec §4.8/§4.9).

pub mod fsm;
pub mod scheduler;
pub mod tcp;

pub use fsm::{RecoveryBackoff, TransportState};
pub use scheduler::{Scheduler, SchedulerKind};

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

/// Abstraction over the byte-oriented stream a transport owns, grounded on
/// [`transport::tcp::byte_stream::ByteStream`]'s role in the teacher (there
/// a sync `Read + Write` trait object unifying plain TCP and TLS; here the
/// async equivalent since the session protocol's I/O is tokio-driven).
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Sync + Unpin {
    /// Peer address, for logging and diagnostics.
    fn peer_description(&self) -> String;
}

/// Unique, process-local identity for one transport instance. A recovered
/// transport gets a fresh ID even if it reconnects to the same address —
/// the "successor, not same instance" rule of spec §4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(pub u64);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xpt:{}", self.0)
    }
}

/// Errors a transport-level send/receive can produce.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "transport io error: {e}"),
            Self::Closed => f.write_str("transport is closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
