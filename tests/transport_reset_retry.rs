// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Seed scenario: a command is sent on transport T1, which resets before its
// response arrives. The initiator retries the same command -- same
// ExchangeID, same SlotSN -- over transport T2. The target recognizes it as
// a retry of the already-registered exchange rather than a fresh command,
// and the initiator's single completion future resolves exactly once.

use dsp_session::channel::{InitiatorChannel, RequestOutcome, TargetChannel};
use dsp_session::transport::scheduler::{Candidate, SchedulerKind};
use dsp_session::transport::TransportId;

fn candidates(id: u64) -> Vec<Candidate> {
    vec![Candidate {
        id: TransportId(id),
        queue_depth: 0,
    }]
}

#[tokio::test]
async fn retry_after_transport_reset_is_recognized_and_completes_once() {
    let initiator = InitiatorChannel::new(4, SchedulerKind::RoundRobin);
    let target = TargetChannel::new(4);

    let (first, rx) = initiator.submit(&candidates(1)).unwrap();
    assert_eq!(first.transport, TransportId(1));

    let first_outcome = target
        .dispatch_command_request(
            first.exchange_id,
            first.slot_id,
            first.slot_sn,
            first.command_sn,
            3,
            first.transport,
        )
        .unwrap();
    assert!(matches!(first_outcome, RequestOutcome::Enter { .. }));

    // T1 resets here; no response ever arrives for the first attempt.

    let retried = initiator
        .retry(first.exchange_id, &candidates(2))
        .expect("command still pending, retry should succeed");
    assert_eq!(retried.exchange_id, first.exchange_id);
    assert_eq!(retried.slot_sn, first.slot_sn);
    assert_eq!(retried.transport, TransportId(2));

    let retry_outcome = target
        .dispatch_command_request(
            retried.exchange_id,
            retried.slot_id,
            retried.slot_sn,
            retried.command_sn,
            3,
            retried.transport,
        )
        .unwrap();
    assert!(matches!(retry_outcome, RequestOutcome::Retry { cached: None }));
    assert_eq!(target.registered_count(), 1);

    target.dispatch_response(retried.exchange_id, b"done".to_vec());
    initiator.complete(retried.exchange_id, b"done".to_vec());

    assert_eq!(rx.await.unwrap().unwrap(), b"done");
    assert_eq!(initiator.pending_count(), 0);
    assert_eq!(initiator.stats().retries, 1);
}
