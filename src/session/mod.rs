// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The nexus-level session: terminus identity, the session FSM, login
//! failure taxonomy, and fore/back channel composition (spec §4.10/§4.11).

pub mod nexus;
pub mod reinstatement;
pub mod state;
pub mod terminus;

pub use nexus::{ChannelSide, FrameStamp, Nexus};
pub use reinstatement::{ReinstatementChains, ReinstatementLink, SessionId};
pub use state::{KeepaliveTimer, SessionState};
pub use terminus::Terminus;

use std::fmt;

/// Login failure codes (spec §7). Most are fatal to the whole session;
/// `ConnectionExceeded` and `ServiceUnreachable` are per-transport and may
/// leave the session viable on its remaining transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginFailure {
    VersionUnsupported,
    ServiceUnavailable,
    SessionInvalid,
    SessionNonexistent,
    TlsUnsupported,
    TlsRequired,
    SaslFailure,
    ParameterUnsupported,
    ConnectionExceeded,
    ServiceUnreachable,
}

impl LoginFailure {
    /// Whether this failure is scoped to the transport that hit it, rather
    /// than fatal to the whole session.
    #[must_use]
    pub fn is_per_transport(self) -> bool {
        matches!(self, Self::ConnectionExceeded | Self::ServiceUnreachable)
    }
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VersionUnsupported => "VERSION_UNSUPPORTED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::SessionInvalid => "SESSION_INVALID",
            Self::SessionNonexistent => "SESSION_NONEXISTENT",
            Self::TlsUnsupported => "TLS_UNSUPPORTED",
            Self::TlsRequired => "TLS_REQUIRED",
            Self::SaslFailure => "SASL_FAILURE",
            Self::ParameterUnsupported => "PARAMETER_UNSUPPORTED",
            Self::ConnectionExceeded => "CONNECTION_EXCEEDED",
            Self::ServiceUnreachable => "SERVICE_UNREACHABLE",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_transport_failures_are_identified() {
        assert!(LoginFailure::ConnectionExceeded.is_per_transport());
        assert!(LoginFailure::ServiceUnreachable.is_per_transport());
        assert!(!LoginFailure::SaslFailure.is_per_transport());
    }
}
