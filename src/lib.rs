// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DSP — Delphix Session Protocol
//!
//! A bidirectional, multi-connection, session-oriented RPC transport with
//! exactly-once logical command delivery over a pool of independently
//! failing byte-streams.
//!
//! A session pairs two peers — initiator and target — over one or more
//! transports. Each side runs an initiator channel (outgoing commands) and
//! a target channel (incoming commands) combined into a [`session::Nexus`].
//! Commands survive individual transport loss: an initiator retries a
//! command over any remaining attached transport, and the target's slot and
//! sequencer bookkeeping tells a genuine retry apart from stale replay so
//! every command is executed exactly once despite the retry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dsp_session::channel::InitiatorChannel;
//! use dsp_session::transport::{scheduler::SchedulerKind, scheduler::Candidate, TransportId};
//!
//! # async fn demo() -> dsp_session::error::Result<()> {
//! let channel = InitiatorChannel::new(32, SchedulerKind::RoundRobin);
//! let candidates = vec![Candidate { id: TransportId(1), queue_depth: 0 }];
//! let (_ticket, response) = channel.submit(&candidates)?;
//! let _ = response.await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                    session::Nexus (per peer pair)                  |
//! |   fore channel (initiator) <-----> back channel (target)           |
//! +---------------------------------------------------------------------+
//! |   channel::InitiatorChannel     |      channel::TargetChannel       |
//! |   slot reservation, retry,      |      sequencer, dispatch,         |
//! |   task management                |      async task queues           |
//! +---------------------------------------------------------------------+
//! |            command::{initiator,target} per-exchange FSMs           |
//! +---------------------------------------------------------------------+
//! |   wire::{header,frame,digest,compress,options} codec                |
//! +---------------------------------------------------------------------+
//! |            transport::{fsm,scheduler,tcp} (N byte-streams)          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`session::Nexus`] | Fore/back channel pair for one side of a session |
//! | [`channel::InitiatorChannel`] | Submits, retries, and aborts outgoing commands |
//! | [`channel::TargetChannel`] | Dispatches incoming commands exactly once |
//! | [`slot::InitiatorSlotTable`] / [`slot::TargetSlotTable`] | Bounded admission windows |
//! | [`config::SessionOptions`] / [`config::NegotiatedOptions`] | Configuration surface (spec §6) |
//!
//! ## Modules Overview
//!
//! - [`session`] — session FSM, terminus identity, nexus composition
//! - [`channel`] — initiator/target channel dispatch
//! - [`command`] — per-exchange state machines
//! - [`slot`] / [`sequencer`] — admission control and in-order delivery
//! - [`wire`] — PDU header, frame, digest, compression, options codec
//! - [`transport`] — byte-stream abstraction, FSM, scheduler

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Per-command state machines (spec §4.5/§4.6).
pub mod command;
/// Session configuration: local options surface and negotiated view (spec §6).
pub mod config;
/// Top-level error taxonomy.
pub mod error;
/// Exchange identity: `ExchangeID` allocation and kind tagging.
pub mod exchange;
/// Compile-time configurable logging system (zero-cost when disabled).
pub mod logging;
/// RFC 1982 serial number arithmetic for `CommandSN`/`SlotSN`.
pub mod serial;
/// Target-side in-order delivery ring (spec §4.4).
pub mod sequencer;
/// Slot tables: bounded per-channel admission control (spec §4.3).
pub mod slot;
/// Per-channel stats counters (spec §3).
pub mod stats;
/// Transport: byte-stream abstraction, connection FSM, scheduler (spec §4.8/§4.9).
pub mod transport;
/// Wire codec: PDU header, frame, digest, compression, options (spec §6).
pub mod wire;

/// Initiator/target channels: the unidirectional command planes a nexus
/// pairs into fore/back channels (spec §4.5/§4.7).
pub mod channel;
/// Nexus-level session: terminus identity, session FSM, reinstatement
/// chains, and fore/back channel composition (spec §4.10/§4.11).
pub mod session;

pub use channel::{InitiatorChannel, TargetChannel};
pub use config::{NegotiatedOptions, SessionOptions};
pub use error::{Error, Result};
pub use exchange::ExchangeId;
pub use session::{Nexus, SessionState, Terminus};

/// DSP protocol version string.
pub const VERSION: &str = "0.1.0";
