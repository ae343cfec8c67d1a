// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Initiator channel (spec §4.5): submit/retry/abort dispatch over a pool
//! of attached transports, grounded on [`rpc::client::ServiceClient`]'s
//! `DashMap`-keyed pending-request registry paired with `oneshot` reply
//! channels.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::command::initiator::InitiatorCommandState;
use crate::error::{Error, TaskMgmtStatus};
use crate::exchange::{ExchangeId, ExchangeIdGenerator};
use crate::serial::{SerialNumber, SerialNumberGenerator};
use crate::slot::{InitiatorSlotTable, ReserveError, SlotFailure};
use crate::stats::{ChannelStats, StatsSnapshot};
use crate::transport::scheduler::{Candidate, Scheduler, SchedulerKind};
use crate::transport::TransportId;

/// What the caller must stamp on the wire and which transport to send it
/// over, returned by [`InitiatorChannel::submit`] and
/// [`InitiatorChannel::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    pub exchange_id: ExchangeId,
    pub slot_id: u32,
    pub slot_sn: SerialNumber,
    pub command_sn: SerialNumber,
    pub transport: TransportId,
}

/// What to send for a task-management (abort) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortTicket {
    pub target_exchange_id: ExchangeId,
    pub target_command_sn: SerialNumber,
    pub target_slot_id: u32,
    pub target_slot_sn: SerialNumber,
    pub transport: TransportId,
}

/// Result of requesting an abort: either the command was never made
/// wire-visible and completed locally, or a TaskMgmt exchange must be sent.
#[derive(Debug)]
pub enum AbortOutcome {
    CompletedLocally,
    SendTaskMgmt(AbortTicket),
}

struct PendingCommand {
    slot_id: u32,
    slot_sn: SerialNumber,
    command_sn: SerialNumber,
    state: InitiatorCommandState,
    bound_transport: TransportId,
    completion: oneshot::Sender<Result<Vec<u8>, Error>>,
}

/// Initiator-side channel: owns the slot table, CommandSN sequence, the
/// pending-exchange registry, and transport scheduling for one direction
/// of a nexus.
pub struct InitiatorChannel {
    slots: InitiatorSlotTable,
    command_sn: SerialNumberGenerator,
    expected_command_sn: AtomicU32,
    maximum_command_sn: AtomicU32,
    exchange_ids: ExchangeIdGenerator,
    scheduler: Scheduler,
    pending: DashMap<ExchangeId, PendingCommand>,
    stats: ChannelStats,
}

impl InitiatorChannel {
    #[must_use]
    pub fn new(capacity: u32, scheduler_kind: SchedulerKind) -> Self {
        Self {
            slots: InitiatorSlotTable::new(capacity),
            command_sn: SerialNumberGenerator::default(),
            expected_command_sn: AtomicU32::new(0),
            maximum_command_sn: AtomicU32::new(capacity.saturating_sub(1)),
            exchange_ids: ExchangeIdGenerator::new(),
            scheduler: Scheduler::new(scheduler_kind),
            pending: DashMap::new(),
            stats: ChannelStats::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Reserve a slot, assign identity, and pick a transport for a new
    /// command. The caller is responsible for actually framing and sending
    /// the request; this only performs the bookkeeping side of Submit
    /// (spec §4.5 steps 2-5).
    pub fn submit(
        &self,
        candidates: &[Candidate],
    ) -> Result<(SubmitTicket, oneshot::Receiver<Result<Vec<u8>, Error>>), Error> {
        let exchange_id = self.exchange_ids.next();
        let (slot_id, slot_sn) = self
            .slots
            .reserve(exchange_id)
            .map_err(|ReserveError::Unavailable| Error::SlotTableExhausted)?;
        let Some(transport) = self.scheduler.choose(candidates) else {
            self.slots.rollback(slot_id);
            self.slots.confirm(slot_id);
            self.slots.release(slot_id);
            return Err(Error::SessionNotReady);
        };
        let command_sn = self.command_sn.next();

        let mut state = InitiatorCommandState::default();
        state = state.on_queued();
        state = state.on_dispatch();

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            exchange_id,
            PendingCommand {
                slot_id,
                slot_sn,
                command_sn,
                state,
                bound_transport: transport,
                completion: tx,
            },
        );
        self.stats.record_submitted();

        Ok((
            SubmitTicket {
                exchange_id,
                slot_id,
                slot_sn,
                command_sn,
                transport,
            },
            rx,
        ))
    }

    /// Reroute an in-flight command whose transport reset, over a newly
    /// chosen transport, keeping its ExchangeID and SlotSN unchanged
    /// (spec §4.5 Retry).
    pub fn retry(&self, exchange_id: ExchangeId, candidates: &[Candidate]) -> Option<SubmitTicket> {
        let mut entry = self.pending.get_mut(&exchange_id)?;
        let transport = self.scheduler.choose(candidates)?;
        entry.bound_transport = transport;
        self.stats.record_retry();
        Some(SubmitTicket {
            exchange_id,
            slot_id: entry.slot_id,
            slot_sn: entry.slot_sn,
            command_sn: entry.command_sn,
            transport,
        })
    }

    /// Request cancellation of a command (spec §4.5 Abort). [`submit`]
    /// assigns a slot and CommandSN synchronously before ever returning a
    /// ticket, so every exchange this channel still tracks is already
    /// wire-visible by the time a caller can name it; `CompletedLocally`
    /// only fires for an exchange this channel never held (already
    /// completed, or simply unknown), not a "not yet sent" one.
    pub fn abort(&self, exchange_id: ExchangeId) -> AbortOutcome {
        let Some(mut entry) = self.pending.get_mut(&exchange_id) else {
            return AbortOutcome::CompletedLocally;
        };
        entry.state = entry.state.on_abort_requested();
        self.stats.record_abort_requested();
        AbortOutcome::SendTaskMgmt(AbortTicket {
            target_exchange_id: exchange_id,
            target_command_sn: entry.command_sn,
            target_slot_id: entry.slot_id,
            target_slot_sn: entry.slot_sn,
            transport: entry.bound_transport,
        })
    }

    /// Refresh this channel's view of the peer's flow-control counters,
    /// carried on every response frame (spec §4.7 Response side effects).
    pub fn refresh_flow_control(&self, expected_command_sn: SerialNumber, maximum_command_sn: SerialNumber) {
        self.expected_command_sn
            .store(expected_command_sn.get(), Ordering::Release);
        self.maximum_command_sn
            .store(maximum_command_sn.get(), Ordering::Release);
    }

    /// Apply a normal CommandResponse: confirm and release the slot,
    /// advance the command's FSM to completion, and resolve its future
    /// (spec §4.5 Completion).
    pub fn complete(&self, exchange_id: ExchangeId, response: Vec<u8>) {
        let Some((_, mut entry)) = self.pending.remove(&exchange_id) else {
            return;
        };
        self.slots.confirm(entry.slot_id);
        self.slots.release(entry.slot_id);
        entry.state = entry.state.on_completed();
        self.stats.record_completed();
        let _ = entry.completion.send(Ok(response));
    }

    /// Apply a SlotFailure response: roll the slot back to its last
    /// confirmed SlotSN, release it, and propagate the error.
    pub fn fail_slot(&self, exchange_id: ExchangeId, failure: SlotFailure) {
        let Some((_, mut entry)) = self.pending.remove(&exchange_id) else {
            return;
        };
        self.slots.rollback(entry.slot_id);
        self.slots.confirm(entry.slot_id);
        self.slots.release(entry.slot_id);
        entry.state = entry.state.on_completed();
        self.stats.record_slot_failure_response();
        let _ = entry.completion.send(Err(Error::SlotFailure(failure)));
    }

    /// Apply a TaskMgmt response, translating its status into the
    /// command's user-visible result. `AbortedBeforeStart` and
    /// `AbortedSlotFailure` mean the peer never consumed the slot, so it
    /// rolls back; `AbortedAfterStart` and `AlreadyCompleted` mean the
    /// peer did act on it, so the slot confirms normally.
    pub fn complete_aborted(&self, exchange_id: ExchangeId, status: TaskMgmtStatus) {
        let Some((_, mut entry)) = self.pending.remove(&exchange_id) else {
            return;
        };
        match status {
            TaskMgmtStatus::AbortedBeforeStart | TaskMgmtStatus::AbortedSlotFailure => {
                self.slots.rollback(entry.slot_id);
                self.slots.confirm(entry.slot_id);
            }
            TaskMgmtStatus::AbortedAfterStart | TaskMgmtStatus::AlreadyCompleted => {
                self.slots.confirm(entry.slot_id);
            }
        }
        self.slots.release(entry.slot_id);
        entry.state = entry.state.on_completed();
        if status == TaskMgmtStatus::AbortedSlotFailure {
            self.stats.record_slot_failure_response();
        } else {
            self.stats.record_completed();
        }
        let _ = entry.completion.send(Err(Error::TaskMgmt(status)));
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Candidate> {
        vec![Candidate {
            id: TransportId(1),
            queue_depth: 0,
        }]
    }

    #[test]
    fn submit_reserves_a_slot_and_picks_a_transport() {
        let channel = InitiatorChannel::new(4, SchedulerKind::RoundRobin);
        let (ticket, _rx) = channel.submit(&candidates()).unwrap();
        assert_eq!(ticket.slot_id, 0);
        assert_eq!(ticket.command_sn, SerialNumber::new(0));
        assert_eq!(channel.pending_count(), 1);
    }

    #[test]
    fn submit_without_candidates_rolls_back_and_frees_slot() {
        let channel = InitiatorChannel::new(4, SchedulerKind::RoundRobin);
        let err = channel.submit(&[]).unwrap_err();
        assert!(matches!(err, Error::SessionNotReady));
        // slot should be free again
        let (ticket, _rx) = channel.submit(&candidates()).unwrap();
        assert_eq!(ticket.slot_id, 0);
    }

    #[test]
    fn exhausted_slot_table_reports_slot_table_exhausted() {
        let channel = InitiatorChannel::new(1, SchedulerKind::RoundRobin);
        let (_ticket, _rx) = channel.submit(&candidates()).unwrap();
        let err = channel.submit(&candidates()).unwrap_err();
        assert!(matches!(err, Error::SlotTableExhausted));
    }

    #[tokio::test]
    async fn completion_resolves_the_future_and_frees_the_slot() {
        let channel = InitiatorChannel::new(1, SchedulerKind::RoundRobin);
        let (ticket, rx) = channel.submit(&candidates()).unwrap();
        channel.complete(ticket.exchange_id, b"ok".to_vec());
        assert_eq!(rx.await.unwrap().unwrap(), b"ok");
        // slot freed: a new submit reuses slot 0
        let (ticket2, _rx2) = channel.submit(&candidates()).unwrap();
        assert_eq!(ticket2.slot_id, 0);
    }

    #[tokio::test]
    async fn slot_failure_rolls_back_and_propagates_error() {
        let channel = InitiatorChannel::new(1, SchedulerKind::RoundRobin);
        let (ticket, rx) = channel.submit(&candidates()).unwrap();
        channel.fail_slot(ticket.exchange_id, SlotFailure::SlotFalseRetry);
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(Error::SlotFailure(SlotFailure::SlotFalseRetry))));
    }

    #[test]
    fn retry_keeps_exchange_and_slot_identity() {
        let channel = InitiatorChannel::new(1, SchedulerKind::RoundRobin);
        let (ticket, _rx) = channel.submit(&candidates()).unwrap();
        let retried = channel.retry(ticket.exchange_id, &candidates()).unwrap();
        assert_eq!(retried.exchange_id, ticket.exchange_id);
        assert_eq!(retried.slot_sn, ticket.slot_sn);
        assert_eq!(retried.slot_id, ticket.slot_id);
    }

    #[test]
    fn abort_of_unknown_exchange_completes_locally() {
        let channel = InitiatorChannel::new(1, SchedulerKind::RoundRobin);
        let outcome = channel.abort(ExchangeId(999));
        assert!(matches!(outcome, AbortOutcome::CompletedLocally));
    }

    #[tokio::test]
    async fn abort_of_pending_command_sends_taskmgmt_and_completes_with_status() {
        let channel = InitiatorChannel::new(1, SchedulerKind::RoundRobin);
        let (ticket, rx) = channel.submit(&candidates()).unwrap();
        let outcome = channel.abort(ticket.exchange_id);
        assert!(matches!(outcome, AbortOutcome::SendTaskMgmt(_)));
        channel.complete_aborted(ticket.exchange_id, TaskMgmtStatus::AbortedBeforeStart);
        let result = rx.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::TaskMgmt(TaskMgmtStatus::AbortedBeforeStart))
        ));
    }
}
