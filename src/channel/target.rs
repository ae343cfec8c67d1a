// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Target channel (spec §4.7): the exchange receive dispatcher, the
//! ExchangeID registry routing retries and task-management onto live
//! commands, and the four per-channel async task queues, grounded on
//! [`rpc::server`]'s dispatch-by-kind loop and [`rpc::client::
//! ServiceClient`]'s `DashMap`-keyed registry style.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;
use dashmap::DashMap;

use crate::command::target::TargetCommandState;
use crate::error::{Error, TaskMgmtStatus};
use crate::exchange::ExchangeId;
use crate::sequencer::{DrainMode, Sequencer};
use crate::serial::SerialNumber;
use crate::slot::target::{CachedResponse, Reservation};
use crate::slot::{SlotFailure, TargetSlotTable};
use crate::stats::{ChannelStats, StatsSnapshot};
use crate::transport::TransportId;

/// A FIFO task queue tied to channel connectivity: ready only while at
/// least one transport is attached (spec §4.7 Async task queues). Backed by
/// a lock-free [`SegQueue`], the same structure the teacher reaches for at
/// its busiest fan-in points (`engine::router`'s inbound packet queue).
pub struct AsyncQueue<T> {
    items: SegQueue<T>,
    attached_transports: AtomicUsize,
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self {
            items: SegQueue::new(),
            attached_transports: AtomicUsize::new(0),
        }
    }
}

impl<T> AsyncQueue<T> {
    pub fn push(&self, item: T) {
        self.items.push(item);
    }

    /// Pop the next item, but only while the channel has an attached
    /// transport; otherwise the worker should stay quiesced.
    pub fn pop_if_ready(&self) -> Option<T> {
        if !self.is_ready() {
            return None;
        }
        self.items.pop()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.attached_transports.load(Ordering::Acquire) > 0
    }

    pub fn attach(&self) {
        self.attached_transports.fetch_add(1, Ordering::AcqRel);
    }

    pub fn detach(&self) {
        self.attached_transports.fetch_sub(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The four async queues a target channel drains work through.
#[derive(Default)]
pub struct ChannelQueues {
    pub retry_response: AsyncQueue<ExchangeId>,
    pub abort_response: AsyncQueue<ExchangeId>,
    /// Slot-failure responses, ordered with respect to TaskMgmt responses.
    pub error: AsyncQueue<(ExchangeId, SlotFailure)>,
    /// Batched sequencer drain after a restart or burst arrival.
    pub restart: AsyncQueue<ExchangeId>,
}

impl ChannelQueues {
    pub fn attach_transport(&self) {
        self.retry_response.attach();
        self.abort_response.attach();
        self.error.attach();
        self.restart.attach();
    }

    pub fn detach_transport(&self) {
        self.retry_response.detach();
        self.abort_response.detach();
        self.error.detach();
        self.restart.detach();
    }
}

struct CommandEntry {
    slot_id: u32,
    slot_sn: SerialNumber,
    command_sn: SerialNumber,
    state: TargetCommandState,
    primary_transport: TransportId,
    /// Transports of retry instances awaiting their own response, beyond
    /// the primary (spec §4.6 Transport allegiance).
    retry_instances: VecDeque<TransportId>,
    /// A TaskMgmt arrived while this command was `Retry`; apply the abort
    /// transition once the retry queue drains.
    pending_abort: bool,
    /// True for a placeholder created because a TaskMgmt arrived before its
    /// target command (spec glossary: ghost command).
    is_ghost: bool,
    /// Status last computed for a TaskMgmt response against this command,
    /// so a client retry of the abort (`Aborted` -> `on_taskmgmt_retry`)
    /// replays the same outcome instead of recomputing it from a state that
    /// no longer distinguishes `AbortedBeforeStart` from `AbortedAfterStart`.
    last_taskmgmt_status: Option<TaskMgmtStatus>,
}

/// Status a TaskMgmt response should carry for a command currently in
/// `state`, computed at the moment the request is routed to it (spec §4.5/
/// §4.6). Only meaningful for the states a TaskMgmt can actually land on.
fn taskmgmt_status_for(state: TargetCommandState) -> TaskMgmtStatus {
    match state {
        TargetCommandState::Pending => TaskMgmtStatus::AbortedBeforeStart,
        TargetCommandState::Active => TaskMgmtStatus::AbortedAfterStart,
        TargetCommandState::InDoubt | TargetCommandState::Retry => TaskMgmtStatus::AlreadyCompleted,
        other => panic!("taskmgmt status requested for unexpected target command state {other:?}"),
    }
}

/// What the dispatcher must do in response to a CommandRequest.
pub enum RequestOutcome {
    /// New command admitted; run the application, then call
    /// [`TargetChannel::dispatch_response`]. `ghost_failures` lists any
    /// TaskMgmt ghost commands (spec glossary) that the sequencer released
    /// in this same drain window without their real command ever arriving
    /// — each already finalized as a slot failure and queued on
    /// [`ChannelQueues::error`].
    Enter {
        drained: u32,
        mode: DrainMode,
        evicted: Option<CachedResponse>,
        ghost_failures: Vec<ExchangeId>,
    },
    /// A retry of an in-flight or already-answered command; if cached is
    /// `Some`, reply immediately without re-running the application.
    Retry { cached: Option<CachedResponse> },
    /// CommandSN below ExpectedCommandSN from a stale transport: dropped
    /// silently, no response sent (spec §9 Open Question: this asymmetry
    /// with TaskMgmt handling is intentional).
    Dropped,
}

/// What the dispatcher must do in response to a TaskMgmtRequest.
pub enum TaskMgmtOutcome {
    /// Routed into the target command's own FSM; carries the status the
    /// eventual TaskMgmt response should report, computed from the
    /// command's FSM state at routing time (spec §4.5/§4.6) and also
    /// queued on [`ChannelQueues::abort_response`].
    RoutedToCommand(TaskMgmtStatus),
    /// `targetCommandSN < expectedCommandSN`: the target command already
    /// completed or was evicted on a stale transport's view. Synthesize
    /// the error reply rather than silently dropping (unlike
    /// CommandRequest's drop path — the spec's asymmetry, preserved
    /// deliberately).
    SynthesizedAbortedSlotFailure,
    /// No registered command existed yet: a ghost command was created to
    /// keep sequencer state consistent, carrying the pending abort.
    /// `ghost_failures` carries any *other* ghosts this same drain window
    /// released without ever seeing their command.
    GhostCreated {
        drained: u32,
        mode: DrainMode,
        ghost_failures: Vec<ExchangeId>,
    },
}

/// Target-side channel: slot table, sequencer, ExchangeID registry, and the
/// four connectivity-gated async queues for one direction of a nexus.
pub struct TargetChannel {
    slots: TargetSlotTable,
    sequencer: Sequencer,
    expected_command_sn: AtomicU32,
    available_slots: AtomicU32,
    registry: DashMap<ExchangeId, CommandEntry>,
    /// CommandSN -> ExchangeID for every entry still `Pending` (admitted but
    /// not yet released by the sequencer), so a drain can look up exactly
    /// which entries to release without scanning the whole registry.
    sn_index: DashMap<SerialNumber, ExchangeId>,
    pub queues: ChannelQueues,
    stats: ChannelStats,
}

impl TargetChannel {
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: TargetSlotTable::new(capacity),
            sequencer: Sequencer::new(capacity.max(1) as usize, SerialNumber::ZERO),
            expected_command_sn: AtomicU32::new(0),
            available_slots: AtomicU32::new(capacity),
            registry: DashMap::new(),
            sn_index: DashMap::new(),
            queues: ChannelQueues::default(),
            stats: ChannelStats::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn expected_command_sn(&self) -> SerialNumber {
        SerialNumber::new(self.expected_command_sn.load(Ordering::Acquire))
    }

    /// `max = expected + availableSlots - 1` (spec §4.7).
    #[must_use]
    pub fn maximum_command_sn(&self) -> SerialNumber {
        let expected = self.expected_command_sn.load(Ordering::Acquire);
        let available = self.available_slots.load(Ordering::Acquire);
        SerialNumber::new(expected.wrapping_add(available.saturating_sub(1)))
    }

    pub fn dispatch_command_request(
        &self,
        exchange_id: ExchangeId,
        slot_id: u32,
        slot_sn: SerialNumber,
        command_sn: SerialNumber,
        max_slot_id_in_use: u32,
        transport: TransportId,
    ) -> Result<RequestOutcome, Error> {
        if command_sn.compare(self.maximum_command_sn()) == std::cmp::Ordering::Greater {
            self.stats.record_protocol_violation();
            return Err(Error::ProtocolViolation(format!(
                "commandSN {command_sn} exceeds maximumCommandSN {}",
                self.maximum_command_sn()
            )));
        }

        if let Some(mut entry) = self.registry.get_mut(&exchange_id) {
            entry.retry_instances.push_back(transport);
            if entry.state == TargetCommandState::InDoubt {
                entry.state = entry.state.on_retry_arrival();
            }
            let cached = self.slots.cached_response(slot_id, exchange_id);
            return Ok(RequestOutcome::Retry { cached });
        }

        if command_sn.compare(self.expected_command_sn()) == std::cmp::Ordering::Less {
            return Ok(RequestOutcome::Dropped);
        }

        let Reservation { evicted } = self
            .slots
            .reserve(slot_id, slot_sn, exchange_id, max_slot_id_in_use)?;

        if let Some(evicted) = &evicted {
            if let Some((_, mut finalized)) = self.registry.remove(&evicted.exchange_id) {
                finalized.state = finalized.state.on_eviction();
            }
            self.stats.record_eviction();
        }

        let released_from = self.sequencer.head();
        let outcome = self.sequencer.enter(command_sn)?;
        self.sn_index.insert(command_sn, exchange_id);
        self.registry.insert(
            exchange_id,
            CommandEntry {
                slot_id,
                slot_sn,
                command_sn,
                state: TargetCommandState::Initial.on_sequencer_enter(),
                primary_transport: transport,
                retry_instances: VecDeque::new(),
                pending_abort: false,
                is_ghost: false,
                last_taskmgmt_status: None,
            },
        );
        let ghost_failures = self.release_window(released_from, outcome.drained);
        if !ghost_failures.is_empty() {
            // A resolved ghost never calls dispatch_response, so unlike a
            // real command it has no future response to lazily carry this
            // resync on; do it here or it never happens.
            self.advance_available_slots();
        }
        if outcome.mode == DrainMode::Async {
            self.queues.restart.push(exchange_id);
        }

        Ok(RequestOutcome::Enter {
            drained: outcome.drained,
            mode: outcome.mode,
            evicted,
            ghost_failures,
        })
    }

    /// Release every entry the sequencer just drained, in CommandSN order
    /// starting at `start` (the pre-call head), moving each from `Pending`
    /// to `Active` (spec §4.6: the sequencer releasing a command is
    /// distinct from its response later being dispatched). A released ghost
    /// has no real command to run, so it is immediately finalized as a slot
    /// failure (`on_slot_failure`) and queued on [`ChannelQueues::error`]
    /// rather than left `Active` forever.
    fn release_window(&self, start: SerialNumber, count: u32) -> Vec<ExchangeId> {
        let mut ghost_failures = Vec::new();
        let mut cursor = start;
        for _ in 0..count {
            if let Some((_, exchange_id)) = self.sn_index.remove(&cursor) {
                if let Some(mut entry) = self.registry.get_mut(&exchange_id) {
                    entry.state = entry.state.on_sequencer_release();
                    if entry.is_ghost {
                        entry.state = entry.state.on_slot_failure();
                        drop(entry);
                        self.registry.remove(&exchange_id);
                        self.stats.record_slot_failure_response();
                        self.queues
                            .error
                            .push((exchange_id, SlotFailure::SlotSeqMisordered));
                        ghost_failures.push(exchange_id);
                    }
                }
            }
            cursor = cursor.succ();
        }
        ghost_failures
    }

    pub fn dispatch_taskmgmt_request(
        &self,
        target_exchange_id: ExchangeId,
        target_command_sn: SerialNumber,
        request_command_sn: SerialNumber,
    ) -> Result<TaskMgmtOutcome, Error> {
        let max = self.maximum_command_sn();
        if target_command_sn.compare(request_command_sn) == std::cmp::Ordering::Greater
            || request_command_sn.compare(max) == std::cmp::Ordering::Greater
        {
            self.stats.record_protocol_violation();
            return Err(Error::ProtocolViolation(format!(
                "taskMgmt targetCommandSN {target_command_sn} / requestCommandSN {request_command_sn} out of [., {max}]"
            )));
        }

        if let Some(mut entry) = self.registry.get_mut(&target_exchange_id) {
            let status = match entry.state {
                TargetCommandState::Retry => {
                    entry.pending_abort = true;
                    entry
                        .last_taskmgmt_status
                        .unwrap_or(TaskMgmtStatus::AlreadyCompleted)
                }
                TargetCommandState::Aborted => {
                    entry.state = entry.state.on_taskmgmt_retry();
                    entry
                        .last_taskmgmt_status
                        .expect("an Aborted command must have a recorded taskmgmt status")
                }
                other => {
                    let status = taskmgmt_status_for(other);
                    entry.state = entry.state.on_taskmgmt_arrival();
                    entry.last_taskmgmt_status = Some(status);
                    status
                }
            };
            self.queues.abort_response.push(target_exchange_id);
            return Ok(TaskMgmtOutcome::RoutedToCommand(status));
        }

        if target_command_sn.compare(self.expected_command_sn()) == std::cmp::Ordering::Less {
            self.stats.record_slot_failure_response();
            self.queues.abort_response.push(target_exchange_id);
            return Ok(TaskMgmtOutcome::SynthesizedAbortedSlotFailure);
        }

        let released_from = self.sequencer.head();
        let outcome = self.sequencer.enter(request_command_sn)?;
        self.sn_index.insert(request_command_sn, target_exchange_id);
        self.registry.insert(
            target_exchange_id,
            CommandEntry {
                slot_id: u32::MAX,
                slot_sn: SerialNumber::ZERO,
                command_sn: request_command_sn,
                state: TargetCommandState::Initial.on_sequencer_enter(),
                primary_transport: TransportId(0),
                retry_instances: VecDeque::new(),
                pending_abort: true,
                is_ghost: true,
                last_taskmgmt_status: None,
            },
        );
        let ghost_failures = self.release_window(released_from, outcome.drained);
        if !ghost_failures.is_empty() {
            self.advance_available_slots();
        }
        if outcome.mode == DrainMode::Async {
            self.queues.restart.push(target_exchange_id);
        }
        Ok(TaskMgmtOutcome::GhostCreated {
            drained: outcome.drained,
            mode: outcome.mode,
            ghost_failures,
        })
    }

    /// Application finished executing; cache the response and advance the
    /// command's FSM, then the channel's flow-control window. The command
    /// must already be `Active` — released by the sequencer via
    /// [`TargetChannel::dispatch_command_request`] or
    /// [`TargetChannel::dispatch_taskmgmt_request`] — before this is called.
    pub fn dispatch_response(&self, exchange_id: ExchangeId, response: Vec<u8>) {
        let Some(mut entry) = self.registry.get_mut(&exchange_id) else {
            return;
        };
        entry.state = entry.state.on_response_dispatched();
        if !entry.is_ghost {
            self.slots.complete(
                entry.slot_id,
                CachedResponse {
                    exchange_id,
                    slot_sn: entry.slot_sn,
                    response,
                },
            );
        }
        if !entry.retry_instances.is_empty() {
            entry.retry_instances.clear();
            self.queues.retry_response.push(exchange_id);
        }
        drop(entry);
        self.advance_available_slots();
    }

    /// Advance `expectedCommandSN` to reflect the sequencer's new head,
    /// then recompute `availableSlots` from the slot table's current
    /// ceiling. Must happen before the response is sent (spec §4.7).
    fn advance_available_slots(&self) {
        self.expected_command_sn
            .store(self.sequencer.head().get(), Ordering::Release);
        self.available_slots
            .store(self.slots.current_max() + 1, Ordering::Release);
    }

    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xid(n: u64) -> ExchangeId {
        ExchangeId(n)
    }

    #[test]
    fn single_in_order_command_enters_and_dispatches() {
        let channel = TargetChannel::new(4);
        let outcome = channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Enter { drained: 1, .. }));
        channel.dispatch_response(xid(1), b"ok".to_vec());
        assert_eq!(channel.expected_command_sn(), SerialNumber::new(1));
    }

    #[test]
    fn retry_of_inflight_command_is_queued_not_reentered() {
        let channel = TargetChannel::new(4);
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        let outcome = channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(2),
            )
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Retry { cached: None }));
        assert_eq!(channel.registered_count(), 1);
    }

    #[test]
    fn retry_of_completed_command_returns_cached_response() {
        let channel = TargetChannel::new(4);
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        channel.dispatch_response(xid(1), b"ok".to_vec());
        let outcome = channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(2),
            )
            .unwrap();
        match outcome {
            RequestOutcome::Retry { cached: Some(c) } => assert_eq!(c.response, b"ok"),
            _ => panic!("expected cached retry response"),
        }
    }

    #[test]
    fn stale_command_sn_below_expected_is_dropped() {
        let channel = TargetChannel::new(4);
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        channel.dispatch_response(xid(1), b"ok".to_vec());
        let outcome = channel
            .dispatch_command_request(
                xid(2),
                1,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Dropped));
    }

    #[test]
    fn taskmgmt_below_expected_synthesizes_slot_failure_not_a_drop() {
        let channel = TargetChannel::new(4);
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        channel.dispatch_response(xid(1), b"ok".to_vec());
        let outcome = channel
            .dispatch_taskmgmt_request(xid(99), SerialNumber::new(0), SerialNumber::new(1))
            .unwrap();
        assert!(matches!(
            outcome,
            TaskMgmtOutcome::SynthesizedAbortedSlotFailure
        ));
    }

    #[test]
    fn taskmgmt_for_pending_command_routes_into_its_fsm() {
        let channel = TargetChannel::new(4);
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        let outcome = channel
            .dispatch_taskmgmt_request(xid(1), SerialNumber::new(0), SerialNumber::new(0))
            .unwrap();
        // The command drained immediately (drained: 1 in the setup above) so
        // it is already `Active` by the time the abort lands.
        assert!(matches!(
            outcome,
            TaskMgmtOutcome::RoutedToCommand(TaskMgmtStatus::AbortedAfterStart)
        ));
    }

    #[test]
    fn taskmgmt_before_its_command_creates_a_ghost() {
        let channel = TargetChannel::new(4);
        let outcome = channel
            .dispatch_taskmgmt_request(xid(5), SerialNumber::new(0), SerialNumber::new(0))
            .unwrap();
        assert!(matches!(outcome, TaskMgmtOutcome::GhostCreated { .. }));
        assert_eq!(channel.registered_count(), 1);
    }

    #[test]
    fn eviction_of_a_completed_command_removes_it_from_the_registry() {
        let channel = TargetChannel::new(4);
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        channel.dispatch_response(xid(1), b"ok".to_vec());
        assert_eq!(channel.registered_count(), 1);
        channel
            .dispatch_command_request(
                xid(2),
                0,
                SerialNumber::new(2),
                SerialNumber::new(1),
                3,
                TransportId(1),
            )
            .unwrap();
        // xid(1) was evicted and finalized; only xid(2) remains registered.
        assert_eq!(channel.registered_count(), 1);
    }

    #[test]
    fn queue_is_not_ready_until_a_transport_attaches() {
        let queues = ChannelQueues::default();
        queues.retry_response.push(xid(1));
        assert!(queues.retry_response.pop_if_ready().is_none());
        queues.attach_transport();
        assert_eq!(queues.retry_response.pop_if_ready(), Some(xid(1)));
    }

    #[test]
    fn ghost_released_without_its_command_resolves_as_a_slot_failure() {
        let channel = TargetChannel::new(4);
        channel.queues.attach_transport();
        // A TaskMgmt for commandSN 0 arrives before any CommandRequest does.
        let outcome = channel
            .dispatch_taskmgmt_request(xid(9), SerialNumber::new(0), SerialNumber::new(0))
            .unwrap();
        match outcome {
            TaskMgmtOutcome::GhostCreated {
                drained,
                ghost_failures,
                ..
            } => {
                assert_eq!(drained, 1);
                assert_eq!(ghost_failures, vec![xid(9)]);
            }
            _ => panic!("expected a ghost to be created and immediately released"),
        }
        // The ghost never occupied the registry once resolved.
        assert_eq!(channel.registered_count(), 0);
        assert_eq!(
            channel.queues.error.pop_if_ready(),
            Some((xid(9), SlotFailure::SlotSeqMisordered))
        );
    }

    #[test]
    fn routing_a_taskmgmt_request_queues_its_eventual_abort_response() {
        let channel = TargetChannel::new(4);
        channel.queues.attach_transport();
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        channel
            .dispatch_taskmgmt_request(xid(1), SerialNumber::new(0), SerialNumber::new(0))
            .unwrap();
        assert_eq!(channel.queues.abort_response.pop_if_ready(), Some(xid(1)));
    }

    #[test]
    fn completing_a_command_with_queued_retries_wakes_the_retry_queue() {
        let channel = TargetChannel::new(4);
        channel.queues.attach_transport();
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(1),
            )
            .unwrap();
        // A duplicate arrives over a second transport before the first
        // response is ready.
        channel
            .dispatch_command_request(
                xid(1),
                0,
                SerialNumber::new(1),
                SerialNumber::new(0),
                3,
                TransportId(2),
            )
            .unwrap();
        channel.dispatch_response(xid(1), b"ok".to_vec());
        assert_eq!(channel.queues.retry_response.pop_if_ready(), Some(xid(1)));
    }
}
