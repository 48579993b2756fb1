// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use theta_sketch::theta::ConcurrentSharedThetaSketch;

#[test]
fn test_single_local_below_threshold_does_not_propagate() {
    let shared = ConcurrentSharedThetaSketch::builder().lg_k(12).build();
    let mut local = shared.new_local(8, 0.01);

    for i in 0..10u64 {
        local.update(i);
    }

    assert_eq!(shared.estimate(), 0.0, "nothing should have propagated yet");
    local.flush();
    assert_eq!(shared.estimate(), 10.0);

    shared.shutdown();
}

#[test]
fn test_single_local_propagates_past_threshold() {
    let shared = ConcurrentSharedThetaSketch::builder().lg_k(12).build();
    let mut local = shared.new_local(8, 0.1);

    for i in 0..1000u64 {
        local.update(i);
    }
    local.flush();

    let diff = (shared.estimate() - 1000.0).abs();
    assert!(diff <= 1000.0 * 0.1, "estimate={}", shared.estimate());

    shared.shutdown();
}

// Scenario: k=256 local sketches, 4 concurrent writers each inserting 50_000
// disjoint integers; after quiesce the shared estimate should land within a
// few percent of the true union cardinality of 200_000.
#[test]
fn test_many_concurrent_writers_converge_to_union_cardinality() {
    let shared = ConcurrentSharedThetaSketch::builder().lg_k(12).build();

    const WRITERS: u64 = 4;
    const PER_WRITER: u64 = 50_000;

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let shared_ref = &shared;
            scope.spawn(move || {
                let mut local = shared_ref.new_local(8, 0.02);
                let base = writer * PER_WRITER;
                for i in 0..PER_WRITER {
                    local.update(base + i);
                }
                local.flush();
            });
        }
    });

    let estimate = shared.estimate();
    let truth = (WRITERS * PER_WRITER) as f64;
    let diff = (estimate - truth).abs();
    assert!(
        diff <= truth * 0.05,
        "estimate {estimate} not within 5% of {truth}"
    );

    shared.shutdown();
}

#[test]
fn test_snapshot_reflects_propagated_state() {
    let shared = ConcurrentSharedThetaSketch::builder().lg_k(12).build();
    let mut local = shared.new_local(8, 0.01);

    for i in 0..200u64 {
        local.update(i);
    }
    local.flush();

    let snapshot = shared.snapshot();
    assert_eq!(snapshot.estimate(), shared.estimate());
    assert!(!snapshot.is_empty());

    shared.shutdown();
}

#[test]
fn test_theta_is_monotonically_non_increasing() {
    let shared = ConcurrentSharedThetaSketch::builder().lg_k(8).build();
    let mut local = shared.new_local(6, 0.05);

    let mut last_theta = shared.theta();
    for batch in 0..20 {
        for i in 0..500u64 {
            local.update(batch * 500 + i);
        }
        local.flush();
        let theta = shared.theta();
        assert!(theta <= last_theta, "theta must never increase");
        last_theta = theta;
    }

    shared.shutdown();
}

#[test]
#[should_panic(expected = "lg_k")]
fn test_new_local_rejects_out_of_range_lg_k() {
    let shared = ConcurrentSharedThetaSketch::builder().build();
    let _ = shared.new_local(200, 0.01);
}

#[test]
#[should_panic(expected = "max_concurrency_error")]
fn test_new_local_rejects_out_of_range_concurrency_error() {
    let shared = ConcurrentSharedThetaSketch::builder().build();
    let _ = shared.new_local(8, 1.5);
}

#[test]
fn test_shutdown_stops_accepting_further_propagation_targets() {
    let shared = ConcurrentSharedThetaSketch::builder().lg_k(10).build();
    let mut local = shared.new_local(8, 0.01);
    for i in 0..100u64 {
        local.update(i);
    }
    local.flush();
    let estimate_before = shared.estimate();
    drop(local);
    shared.shutdown();
    assert_eq!(estimate_before, 100.0);
}
