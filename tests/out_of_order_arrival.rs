// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Seed scenario: eight commands land at the target across two transports in
// arrival order [2, 0, 1, 3, 5, 4, 6, 7]. The sequencer must stash everything
// ahead of CommandSN 0 until it shows up, then drain the whole contiguous
// prefix at once; only the stashed arrivals should report a nonzero order
// distance.

use dsp_session::channel::{RequestOutcome, TargetChannel};
use dsp_session::exchange::ExchangeId;
use dsp_session::serial::SerialNumber;
use dsp_session::transport::TransportId;

#[test]
fn eight_commands_out_of_order_drain_in_commandsn_order() {
    let target = TargetChannel::new(8);
    let arrival = [2u32, 0, 1, 3, 5, 4, 6, 7];
    let transports = [TransportId(1), TransportId(2)];

    let mut total_drained = 0u32;
    for (i, sn) in arrival.iter().enumerate() {
        let transport = transports[i % transports.len()];
        let outcome = target
            .dispatch_command_request(
                ExchangeId(u64::from(*sn)),
                *sn,
                SerialNumber::new(1),
                SerialNumber::new(*sn),
                7,
                transport,
            )
            .unwrap();
        match outcome {
            RequestOutcome::Enter { drained, .. } => total_drained += drained,
            RequestOutcome::Retry { .. } => panic!("unexpected Retry for a fresh commandSN"),
            RequestOutcome::Dropped => panic!("unexpected Dropped for an in-window commandSN"),
        }
    }

    assert_eq!(total_drained, 8);
    // The sequencer's own head already reached 8 once the gap at 0 closed;
    // the channel's expectedCommandSN tracks it lazily, via whichever
    // response gets dispatched first.
    assert_eq!(target.expected_command_sn(), SerialNumber::ZERO);
    target.dispatch_response(ExchangeId(0), b"ok".to_vec());
    assert_eq!(target.expected_command_sn(), SerialNumber::new(8));
}
