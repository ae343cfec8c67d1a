// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nexus composition (spec §4.11): each side owns a fore (issuing) and back
//! (receiving) channel sharing one transport set; every frame stamps its
//! origin channel's CommandSN and the opposite channel's ExpectedCommandSN
//! as an acknowledgment piggyback.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::serial::{SerialNumber, SerialNumberGenerator};
use crate::wire::options::{negotiate_and, negotiate_list, negotiate_min, negotiate_or, OptionValue, Options};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSide {
    Fore,
    Back,
}

impl ChannelSide {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Fore => Self::Back,
            Self::Back => Self::Fore,
        }
    }
}

/// What to stamp on an outgoing frame: the origin channel's own CommandSN,
/// plus the opposite channel's ExpectedCommandSN as an ack piggyback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStamp {
    pub command_sn: SerialNumber,
    pub expected_command_sn: SerialNumber,
}

/// Per-channel counters: this channel's own outgoing CommandSN sequence,
/// and the ExpectedCommandSN this side expects next on *this* channel
/// (advanced as frames on it are received, read by the opposite channel's
/// outgoing stamp as the ack piggyback).
#[derive(Debug, Default)]
struct ChannelCounters {
    outgoing: SerialNumberGenerator,
    expected: AtomicU32,
}

impl ChannelCounters {
    fn next_outgoing(&self) -> SerialNumber {
        SerialNumber::new(self.outgoing.next())
    }

    fn expected(&self) -> SerialNumber {
        SerialNumber::new(self.expected.load(Ordering::Acquire))
    }

    fn advance_expected(&self, sn: SerialNumber) {
        self.expected.store(sn.get(), Ordering::Release);
    }
}

/// Ties together the fore and back channel counters for one side of a
/// nexus. Sibling-channel refresh (spec §4.11) happens via
/// [`Nexus::on_frame_received`] updating the receiving channel's expected
/// value, consulted by the opposite channel's next `stamp`.
#[derive(Debug, Default)]
pub struct Nexus {
    fore: ChannelCounters,
    back: ChannelCounters,
}

impl Nexus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, side: ChannelSide) -> &ChannelCounters {
        match side {
            ChannelSide::Fore => &self.fore,
            ChannelSide::Back => &self.back,
        }
    }

    /// Compute the stamp for the next frame to send on `side`.
    pub fn stamp(&self, side: ChannelSide) -> FrameStamp {
        FrameStamp {
            command_sn: self.counters(side).next_outgoing(),
            expected_command_sn: self.counters(side.opposite()).expected(),
        }
    }

    /// Record that a frame carrying `command_sn` arrived on `side`,
    /// refreshing that channel's ExpectedCommandSN for the next stamp on
    /// its sibling.
    pub fn on_frame_received(&self, side: ChannelSide, command_sn: SerialNumber) {
        self.counters(side).advance_expected(command_sn.succ());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionRule {
    Min,
    And,
    Or,
    List,
}

/// Options whose negotiation rule is fixed by the protocol (spec §6/§4.11).
/// Any name not in this table, or tagged `.local`/`.client`/`.server`, is
/// carried through unnegotiated at its local value.
const NEGOTIATED_OPTIONS: &[(&str, OptionRule)] = &[
    ("foreQueueDepth", OptionRule::Min),
    ("backQueueDepth", OptionRule::Min),
    ("foreMaxRequestSize", OptionRule::Min),
    ("foreMaxResponseSize", OptionRule::Min),
    ("backMaxRequestSize", OptionRule::Min),
    ("backMaxResponseSize", OptionRule::Min),
    ("maxTransports", OptionRule::Min),
    ("minKeepaliveTime", OptionRule::Min),
    ("logoutTimeout", OptionRule::Min),
    ("bandwidthLimit", OptionRule::Min),
    ("orderedExecution", OptionRule::And),
    ("syncDispatch", OptionRule::And),
    ("digestData", OptionRule::Or),
    ("headerDigest", OptionRule::List),
    ("frameDigest", OptionRule::List),
    ("payloadDigest", OptionRule::List),
    ("payloadCompression", OptionRule::List),
];

/// Apply the Negotiate-phase rules (spec §4.11) to combine `local`'s
/// proposal with the peer's `remote` proposal into the resulting
/// nexus-scoped options.
#[must_use]
pub fn negotiate(local: &Options, remote: &Options) -> Options {
    let mut result = Options::new();
    for (name, value) in local.iter() {
        if crate::wire::options::is_scoped(name) {
            result.set(name, value.clone());
            continue;
        }
        let Some((_, rule)) = NEGOTIATED_OPTIONS.iter().find(|(n, _)| *n == name) else {
            result.set(name, value.clone());
            continue;
        };
        let Some(peer_value) = remote.get(name) else {
            result.set(name, value.clone());
            continue;
        };
        let negotiated = match rule {
            OptionRule::Min => {
                let a = value.as_int().unwrap_or(i64::MAX);
                let b = peer_value.as_int().unwrap_or(i64::MAX);
                OptionValue::Int(negotiate_min(a, b))
            }
            OptionRule::And => {
                OptionValue::Bool(negotiate_and(
                    value.as_bool().unwrap_or(false),
                    peer_value.as_bool().unwrap_or(false),
                ))
            }
            OptionRule::Or => OptionValue::Bool(negotiate_or(
                value.as_bool().unwrap_or(false),
                peer_value.as_bool().unwrap_or(false),
            )),
            OptionRule::List => {
                let local_list = value.as_list();
                let remote_list = peer_value.as_list();
                let chosen = negotiate_list(&local_list, &remote_list);
                OptionValue::List(chosen.into_iter().map(str::to_string).collect())
            }
        };
        result.set(name, negotiated);
    }
    result
}
