// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session configuration - single source of truth for the wire-negotiable
//! options surface (spec §6).
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: range constants for every validated field, the
//!   way `config.rs` keeps RTPS port constants as associated consts rather
//!   than magic numbers at call sites.
//! - **Level 2 (Dynamic)**: [`SessionOptions`] is the local proposal a nexus
//!   builds before login; [`NegotiatedOptions`] is the typed, read-only view
//!   produced by [`crate::session::nexus::negotiate`] once both peers have
//!   agreed. [`NegotiatedOptionsHandle`] lets a live nexus swap in a freshly
//!   negotiated view after a reinstatement without locking readers out.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::transport::scheduler::SchedulerKind;
use crate::wire::options::{OptionValue, Options};
use crate::wire::{Compression, Digest};

/// A field failed its range or shape check during [`SessionOptions`]
/// construction, or a peer's negotiated value could not be parsed back into
/// [`NegotiatedOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        got: i64,
    },
    Missing(&'static str),
    Malformed {
        field: &'static str,
        detail: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange {
                field,
                min,
                max,
                got,
            } => write!(f, "{field} = {got} outside [{min}, {max}]"),
            Self::Missing(field) => write!(f, "missing negotiated option '{field}'"),
            Self::Malformed { field, detail } => write!(f, "option '{field}': {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Locally configured options surface (spec §6) before negotiation. Every
/// setter validates its input against the field's documented range and
/// returns `Err` rather than silently clamping, so a misconfigured caller
/// fails at the point of the mistake.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    fore_queue_depth: u32,
    back_queue_depth: u32,
    fore_max_request_size: u32,
    fore_max_response_size: u32,
    back_max_request_size: u32,
    back_max_response_size: u32,
    max_transports: u32,
    min_keepalive_time: Duration,
    logout_timeout: Duration,
    ordered_execution: bool,
    sync_dispatch: bool,
    digest_data: bool,
    header_digest: Vec<Digest>,
    frame_digest: Vec<Digest>,
    payload_digest: Vec<Digest>,
    payload_compression: Vec<Compression>,
    bandwidth_limit: Option<u64>,
    scheduler: SchedulerKind,
}

impl SessionOptions {
    pub const MIN_QUEUE_DEPTH: u32 = 1;
    pub const MAX_QUEUE_DEPTH: u32 = 4096;
    pub const DEFAULT_QUEUE_DEPTH: u32 = 32;

    pub const MIN_MESSAGE_SIZE: u32 = 8 * 1024;
    pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;
    pub const DEFAULT_MESSAGE_SIZE: u32 = 1024 * 1024;

    pub const MIN_TRANSPORTS: u32 = 1;
    pub const MAX_TRANSPORTS: u32 = 64;
    pub const DEFAULT_MAX_TRANSPORTS: u32 = 4;

    pub const MIN_KEEPALIVE_SECS: u64 = 0;
    pub const MAX_KEEPALIVE_SECS: u64 = 86_400;
    pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

    pub const MIN_LOGOUT_TIMEOUT_SECS: u64 = 0;
    pub const MAX_LOGOUT_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 10;

    /// Defaults per spec §6: queue depth 32, 1 MiB messages, 4 transports,
    /// 30s keepalive, 10s logout grace, ordered execution and digests off,
    /// no compression, round-robin scheduling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fore_queue_depth: Self::DEFAULT_QUEUE_DEPTH,
            back_queue_depth: Self::DEFAULT_QUEUE_DEPTH,
            fore_max_request_size: Self::DEFAULT_MESSAGE_SIZE,
            fore_max_response_size: Self::DEFAULT_MESSAGE_SIZE,
            back_max_request_size: Self::DEFAULT_MESSAGE_SIZE,
            back_max_response_size: Self::DEFAULT_MESSAGE_SIZE,
            max_transports: Self::DEFAULT_MAX_TRANSPORTS,
            min_keepalive_time: Duration::from_secs(Self::DEFAULT_KEEPALIVE_SECS),
            logout_timeout: Duration::from_secs(Self::DEFAULT_LOGOUT_TIMEOUT_SECS),
            ordered_execution: false,
            sync_dispatch: false,
            digest_data: false,
            header_digest: vec![Digest::None],
            frame_digest: vec![Digest::None],
            payload_digest: vec![Digest::None],
            payload_compression: vec![Compression::None],
            bandwidth_limit: None,
            scheduler: SchedulerKind::RoundRobin,
        }
    }

    fn check_range(field: &'static str, got: u32, min: u32, max: u32) -> Result<(), ConfigError> {
        if got < min || got > max {
            Err(ConfigError::OutOfRange {
                field,
                min: i64::from(min),
                max: i64::from(max),
                got: i64::from(got),
            })
        } else {
            Ok(())
        }
    }

    pub fn set_fore_queue_depth(&mut self, depth: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "foreQueueDepth",
            depth,
            Self::MIN_QUEUE_DEPTH,
            Self::MAX_QUEUE_DEPTH,
        )?;
        self.fore_queue_depth = depth;
        Ok(self)
    }

    pub fn set_back_queue_depth(&mut self, depth: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "backQueueDepth",
            depth,
            Self::MIN_QUEUE_DEPTH,
            Self::MAX_QUEUE_DEPTH,
        )?;
        self.back_queue_depth = depth;
        Ok(self)
    }

    pub fn set_fore_max_request_size(&mut self, size: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "foreMaxRequestSize",
            size,
            Self::MIN_MESSAGE_SIZE,
            Self::MAX_MESSAGE_SIZE,
        )?;
        self.fore_max_request_size = size;
        Ok(self)
    }

    pub fn set_fore_max_response_size(&mut self, size: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "foreMaxResponseSize",
            size,
            Self::MIN_MESSAGE_SIZE,
            Self::MAX_MESSAGE_SIZE,
        )?;
        self.fore_max_response_size = size;
        Ok(self)
    }

    pub fn set_back_max_request_size(&mut self, size: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "backMaxRequestSize",
            size,
            Self::MIN_MESSAGE_SIZE,
            Self::MAX_MESSAGE_SIZE,
        )?;
        self.back_max_request_size = size;
        Ok(self)
    }

    pub fn set_back_max_response_size(&mut self, size: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "backMaxResponseSize",
            size,
            Self::MIN_MESSAGE_SIZE,
            Self::MAX_MESSAGE_SIZE,
        )?;
        self.back_max_response_size = size;
        Ok(self)
    }

    pub fn set_max_transports(&mut self, count: u32) -> Result<&mut Self, ConfigError> {
        Self::check_range(
            "maxTransports",
            count,
            Self::MIN_TRANSPORTS,
            Self::MAX_TRANSPORTS,
        )?;
        self.max_transports = count;
        Ok(self)
    }

    pub fn set_min_keepalive_time(&mut self, keepalive: Duration) -> Result<&mut Self, ConfigError> {
        let secs = keepalive.as_secs();
        if secs > Self::MAX_KEEPALIVE_SECS {
            return Err(ConfigError::OutOfRange {
                field: "minKeepaliveTime",
                min: Self::MIN_KEEPALIVE_SECS as i64,
                max: Self::MAX_KEEPALIVE_SECS as i64,
                got: secs as i64,
            });
        }
        self.min_keepalive_time = keepalive;
        Ok(self)
    }

    pub fn set_logout_timeout(&mut self, timeout: Duration) -> Result<&mut Self, ConfigError> {
        let secs = timeout.as_secs();
        if secs > Self::MAX_LOGOUT_TIMEOUT_SECS {
            return Err(ConfigError::OutOfRange {
                field: "logoutTimeout",
                min: Self::MIN_LOGOUT_TIMEOUT_SECS as i64,
                max: Self::MAX_LOGOUT_TIMEOUT_SECS as i64,
                got: secs as i64,
            });
        }
        self.logout_timeout = timeout;
        Ok(self)
    }

    pub fn set_ordered_execution(&mut self, enabled: bool) -> &mut Self {
        self.ordered_execution = enabled;
        self
    }

    /// Proposes whether `submit()` should block the caller's thread until
    /// the command's slot is actually dispatched rather than returning as
    /// soon as it's queued. This struct only negotiates and stores the
    /// flag; the blocking/notify behavior itself lives in whatever transport
    /// or dispatch-orchestration layer sits above `InitiatorChannel::submit`,
    /// since that's the layer that owns the calling thread.
    pub fn set_sync_dispatch(&mut self, enabled: bool) -> &mut Self {
        self.sync_dispatch = enabled;
        self
    }

    pub fn set_digest_data(&mut self, enabled: bool) -> &mut Self {
        self.digest_data = enabled;
        self
    }

    pub fn set_header_digest(&mut self, preference: Vec<Digest>) -> &mut Self {
        self.header_digest = preference;
        self
    }

    pub fn set_frame_digest(&mut self, preference: Vec<Digest>) -> &mut Self {
        self.frame_digest = preference;
        self
    }

    pub fn set_payload_digest(&mut self, preference: Vec<Digest>) -> &mut Self {
        self.payload_digest = preference;
        self
    }

    pub fn set_payload_compression(&mut self, preference: Vec<Compression>) -> &mut Self {
        self.payload_compression = preference;
        self
    }

    pub fn set_bandwidth_limit(&mut self, bytes_per_sec: Option<u64>) -> &mut Self {
        self.bandwidth_limit = bytes_per_sec;
        self
    }

    pub fn set_scheduler(&mut self, kind: SchedulerKind) -> &mut Self {
        self.scheduler = kind;
        self
    }

    #[must_use]
    pub fn scheduler(&self) -> SchedulerKind {
        self.scheduler
    }

    #[must_use]
    pub fn fore_queue_depth(&self) -> u32 {
        self.fore_queue_depth
    }

    #[must_use]
    pub fn back_queue_depth(&self) -> u32 {
        self.back_queue_depth
    }

    /// Render this proposal as the wire-negotiable [`Options`] map that
    /// [`crate::session::nexus::negotiate`] consumes.
    #[must_use]
    pub fn to_options(&self) -> Options {
        let mut options = Options::new();
        options.set(
            "foreQueueDepth",
            OptionValue::Int(i64::from(self.fore_queue_depth)),
        );
        options.set(
            "backQueueDepth",
            OptionValue::Int(i64::from(self.back_queue_depth)),
        );
        options.set(
            "foreMaxRequestSize",
            OptionValue::Int(i64::from(self.fore_max_request_size)),
        );
        options.set(
            "foreMaxResponseSize",
            OptionValue::Int(i64::from(self.fore_max_response_size)),
        );
        options.set(
            "backMaxRequestSize",
            OptionValue::Int(i64::from(self.back_max_request_size)),
        );
        options.set(
            "backMaxResponseSize",
            OptionValue::Int(i64::from(self.back_max_response_size)),
        );
        options.set(
            "maxTransports",
            OptionValue::Int(i64::from(self.max_transports)),
        );
        options.set(
            "minKeepaliveTime",
            OptionValue::Int(self.min_keepalive_time.as_secs() as i64),
        );
        options.set(
            "logoutTimeout",
            OptionValue::Int(self.logout_timeout.as_secs() as i64),
        );
        options.set(
            "orderedExecution",
            OptionValue::Bool(self.ordered_execution),
        );
        options.set("syncDispatch", OptionValue::Bool(self.sync_dispatch));
        options.set("digestData", OptionValue::Bool(self.digest_data));
        options.set(
            "headerDigest",
            OptionValue::List(
                self.header_digest
                    .iter()
                    .copied()
                    .map(Digest::name)
                    .map(String::from)
                    .collect(),
            ),
        );
        options.set(
            "frameDigest",
            OptionValue::List(
                self.frame_digest
                    .iter()
                    .copied()
                    .map(Digest::name)
                    .map(String::from)
                    .collect(),
            ),
        );
        options.set(
            "payloadDigest",
            OptionValue::List(
                self.payload_digest
                    .iter()
                    .copied()
                    .map(Digest::name)
                    .map(String::from)
                    .collect(),
            ),
        );
        options.set(
            "payloadCompression",
            OptionValue::List(
                self.payload_compression
                    .iter()
                    .copied()
                    .map(Compression::name)
                    .map(String::from)
                    .collect(),
            ),
        );
        if let Some(limit) = self.bandwidth_limit {
            options.set("bandwidthLimit", OptionValue::Int(limit as i64));
        }
        options
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The typed, post-negotiation view of a nexus's options (spec §4.11),
/// parsed back out of the [`Options`] map [`crate::session::nexus::negotiate`]
/// produces. Unlike [`SessionOptions`], every field here is a settled fact
/// both peers agree on, not a local preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedOptions {
    pub fore_queue_depth: u32,
    pub back_queue_depth: u32,
    pub fore_max_request_size: u32,
    pub fore_max_response_size: u32,
    pub back_max_request_size: u32,
    pub back_max_response_size: u32,
    pub max_transports: u32,
    pub min_keepalive_time: Duration,
    pub logout_timeout: Duration,
    pub ordered_execution: bool,
    /// Settled fact both peers agree on; InitiatorChannel does not read it.
    /// A caller wiring `submit()` into its own orchestration loop is
    /// responsible for honoring it.
    pub sync_dispatch: bool,
    pub digest_data: bool,
    pub header_digest: Digest,
    pub frame_digest: Digest,
    pub payload_digest: Digest,
    pub payload_compression: Compression,
}

impl NegotiatedOptions {
    fn required_int(options: &Options, field: &'static str) -> Result<i64, ConfigError> {
        options
            .get(field)
            .and_then(OptionValue::as_int)
            .ok_or(ConfigError::Missing(field))
    }

    fn required_bool(options: &Options, field: &'static str) -> Result<bool, ConfigError> {
        options
            .get(field)
            .and_then(OptionValue::as_bool)
            .ok_or(ConfigError::Missing(field))
    }

    /// First entry of a negotiated `List` option is the agreed choice: the
    /// list ordering from [`crate::wire::options::negotiate_list`] already
    /// puts the higher-preference survivor first.
    fn required_list_head<T>(
        options: &Options,
        field: &'static str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, ConfigError> {
        let list = options.get(field).ok_or(ConfigError::Missing(field))?.as_list();
        let head = list.first().ok_or(ConfigError::Missing(field))?;
        parse(head).ok_or_else(|| ConfigError::Malformed {
            field,
            detail: format!("unrecognized value '{head}'"),
        })
    }

    /// Parse the result of [`crate::session::nexus::negotiate`] into typed
    /// fields, validating every option the negotiation table is expected to
    /// have produced.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self {
            fore_queue_depth: Self::required_int(options, "foreQueueDepth")? as u32,
            back_queue_depth: Self::required_int(options, "backQueueDepth")? as u32,
            fore_max_request_size: Self::required_int(options, "foreMaxRequestSize")? as u32,
            fore_max_response_size: Self::required_int(options, "foreMaxResponseSize")? as u32,
            back_max_request_size: Self::required_int(options, "backMaxRequestSize")? as u32,
            back_max_response_size: Self::required_int(options, "backMaxResponseSize")? as u32,
            max_transports: Self::required_int(options, "maxTransports")? as u32,
            min_keepalive_time: Duration::from_secs(
                Self::required_int(options, "minKeepaliveTime")? as u64,
            ),
            logout_timeout: Duration::from_secs(Self::required_int(options, "logoutTimeout")? as u64),
            ordered_execution: Self::required_bool(options, "orderedExecution")?,
            sync_dispatch: Self::required_bool(options, "syncDispatch")?,
            digest_data: Self::required_bool(options, "digestData")?,
            header_digest: Self::required_list_head(options, "headerDigest", Digest::from_name)?,
            frame_digest: Self::required_list_head(options, "frameDigest", Digest::from_name)?,
            payload_digest: Self::required_list_head(options, "payloadDigest", Digest::from_name)?,
            payload_compression: Self::required_list_head(
                options,
                "payloadCompression",
                Compression::from_name,
            )?,
        })
    }
}

/// Atomically swappable holder for a nexus's current [`NegotiatedOptions`],
/// so readers on other threads never block behind a renegotiation (spec
/// §4.10: reinstatement may re-run login/negotiate on an existing session).
#[derive(Debug)]
pub struct NegotiatedOptionsHandle(ArcSwap<NegotiatedOptions>);

impl NegotiatedOptionsHandle {
    #[must_use]
    pub fn new(initial: NegotiatedOptions) -> Self {
        Self(ArcSwap::new(Arc::new(initial)))
    }

    #[must_use]
    pub fn load(&self) -> Arc<NegotiatedOptions> {
        self.0.load_full()
    }

    pub fn store(&self, updated: NegotiatedOptions) {
        self.0.store(Arc::new(updated));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let opts = SessionOptions::new();
        assert_eq!(opts.fore_queue_depth(), 32);
        assert_eq!(opts.back_queue_depth(), 32);
        assert_eq!(opts.scheduler(), SchedulerKind::RoundRobin);
    }

    #[test]
    fn queue_depth_out_of_range_is_rejected() {
        let mut opts = SessionOptions::new();
        assert!(opts.set_fore_queue_depth(0).is_err());
        assert!(opts.set_fore_queue_depth(4097).is_err());
        assert!(opts.set_fore_queue_depth(4096).is_ok());
    }

    #[test]
    fn message_size_out_of_range_is_rejected() {
        let mut opts = SessionOptions::new();
        assert!(opts.set_fore_max_request_size(1024).is_err());
        assert!(opts
            .set_fore_max_request_size(32 * 1024 * 1024)
            .is_err());
        assert!(opts.set_fore_max_request_size(8 * 1024).is_ok());
    }

    #[test]
    fn keepalive_and_logout_timeout_validate_upper_bound() {
        let mut opts = SessionOptions::new();
        assert!(opts
            .set_min_keepalive_time(Duration::from_secs(86_401))
            .is_err());
        assert!(opts
            .set_min_keepalive_time(Duration::from_secs(86_400))
            .is_ok());
        assert!(opts.set_logout_timeout(Duration::from_secs(61)).is_err());
        assert!(opts.set_logout_timeout(Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn to_options_round_trips_through_negotiation_parse() {
        let opts = SessionOptions::new();
        let rendered = opts.to_options();
        // A self-negotiation (local vs local) should parse back cleanly.
        let negotiated = crate::session::nexus::negotiate(&rendered, &rendered);
        let parsed = NegotiatedOptions::from_options(&negotiated).unwrap();
        assert_eq!(parsed.fore_queue_depth, 32);
        assert!(!parsed.ordered_execution);
        assert_eq!(parsed.payload_compression, Compression::None);
    }

    #[test]
    fn missing_option_is_reported_by_name() {
        let empty = Options::new();
        let err = NegotiatedOptions::from_options(&empty).unwrap_err();
        assert_eq!(err, ConfigError::Missing("foreQueueDepth"));
    }

    #[test]
    fn handle_swaps_without_blocking_a_concurrent_reader() {
        let rendered = SessionOptions::new().to_options();
        let negotiated = crate::session::nexus::negotiate(&rendered, &rendered);
        let handle = NegotiatedOptionsHandle::new(
            NegotiatedOptions::from_options(&negotiated).unwrap(),
        );
        let before = handle.load();
        let mut next = (*before).clone();
        next.ordered_execution = true;
        handle.store(next);
        let after = handle.load();
        assert!(after.ordered_execution);
        assert!(!before.ordered_execution);
    }
}
