// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SerialNumber and slot table benchmarks.
//!
//! Measures the cost of the RFC 1982 cyclic compare on the hot path of
//! every dispatch decision (spec §4.1), and the reserve/confirm/release
//! cycle of the initiator and target slot tables under steady-state reuse
//! (spec §4.2/§4.3).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dsp_session::exchange::ExchangeId;
use dsp_session::serial::SerialNumber;
use dsp_session::slot::target::CachedResponse;
use dsp_session::slot::{InitiatorSlotTable, TargetSlotTable};
use std::hint::black_box as bb;

fn bench_serial_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("serial_compare");

    group.bench_function("close_values", |b| {
        let a = SerialNumber::new(1_000);
        let other = SerialNumber::new(1_001);
        b.iter(|| bb(a.compare(bb(other))));
    });

    group.bench_function("near_wraparound", |b| {
        let a = SerialNumber::new(u32::MAX);
        let other = SerialNumber::new(0);
        b.iter(|| bb(a.compare(bb(other))));
    });

    group.finish();
}

fn bench_initiator_slot_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("initiator_slot_cycle");

    for capacity in [8u32, 64, 512] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                let table = InitiatorSlotTable::new(capacity);
                let mut next_exchange = 0u64;
                b.iter(|| {
                    next_exchange += 1;
                    let (slot_id, _slot_sn) =
                        table.reserve(ExchangeId(next_exchange)).expect("slot available");
                    table.confirm(slot_id);
                    table.release(slot_id);
                    bb(slot_id)
                });
            },
        );
    }

    group.finish();
}

fn bench_target_slot_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("target_slot_cycle");

    for capacity in [8u32, 64, 512] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                let table = TargetSlotTable::new(capacity);
                let mut slot_sn = 0u32;
                b.iter(|| {
                    slot_sn += 1;
                    let exchange_id = ExchangeId(u64::from(slot_sn));
                    let reservation = table
                        .reserve(0, SerialNumber::new(slot_sn), exchange_id, capacity - 1)
                        .expect("reservation accepted");
                    table.complete(
                        0,
                        CachedResponse {
                            exchange_id,
                            slot_sn: SerialNumber::new(slot_sn),
                            response: Vec::new(),
                        },
                    );
                    bb(reservation.evicted.is_some())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_serial_compare,
    bench_initiator_slot_cycle,
    bench_target_slot_cycle
);
criterion_main!(benches);
