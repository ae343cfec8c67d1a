// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session terminus identity formats (spec §6): a client or service side of
//! a nexus is named either by alias or by a stable UUID.

use uuid::Uuid;

/// Identifies one side of a nexus for login, reinstatement matching, and
/// continuation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminus {
    /// A UTF-8 alias, optionally ephemeral (not eligible for reinstatement
    /// matching across process restarts).
    ServiceName { alias: String, ephemeral: bool },
    /// A 128-bit UUID identity, with an optional human-readable alias.
    ServiceUuid {
        uuid: Uuid,
        alias: Option<String>,
        ephemeral: bool,
    },
}

impl Terminus {
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        match self {
            Self::ServiceName { ephemeral, .. } | Self::ServiceUuid { ephemeral, .. } => {
                *ephemeral
            }
        }
    }

    /// Two termini identify the same client for reinstatement purposes iff
    /// their stable identity (UUID, or alias for name-based termini)
    /// matches; ephemeral termini never match anything, including
    /// themselves across logins; a non-ephemeral `ServiceUuid` also
    /// matches a `ServiceName` carrying the same alias.
    #[must_use]
    pub fn same_client(&self, other: &Terminus) -> bool {
        if self.is_ephemeral() || other.is_ephemeral() {
            return false;
        }
        match (self, other) {
            (Self::ServiceUuid { uuid: a, .. }, Self::ServiceUuid { uuid: b, .. }) => a == b,
            (Self::ServiceName { alias: a, .. }, Self::ServiceName { alias: b, .. }) => a == b,
            (
                Self::ServiceUuid { alias: Some(a), .. },
                Self::ServiceName { alias: b, .. },
            )
            | (
                Self::ServiceName { alias: b, .. },
                Self::ServiceUuid { alias: Some(a), .. },
            ) => a == b,
            _ => false,
        }
    }
}
