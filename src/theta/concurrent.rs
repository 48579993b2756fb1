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

//! Concurrent shared/local sketch pair for many writer threads feeding one
//! estimator.
//!
//! [`ConcurrentSharedThetaSketch`] owns a [`ThetaUnion`] behind a mutex and a
//! dedicated single-threaded propagation executor. Each
//! [`ConcurrentLocalThetaSketch`] buffers updates in its own small hash table
//! and, once its retained count crosses a propagation threshold, ships an
//! ordered snapshot to the executor over a channel and resets. Writer
//! threads never take the shared mutex themselves; they only read the
//! shared volatile theta (an atomic) and occasionally compare-and-set their
//! own single-slot in-flight flag.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::common::ResizeFactor;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::compact::CompactThetaSketch;
use crate::theta::hash_table::{validate_lg_k, ThetaFamily, ThetaHashTable, DEFAULT_LG_K, MAX_THETA};
use crate::theta::union::ThetaUnion;
use crate::theta::ThetaSketchView;

/// A snapshot of a local buffer in flight to the shared executor.
struct Propagation {
    hashes: Vec<u64>,
    theta: u64,
    is_empty: bool,
    seed_hash: u16,
    in_flight: Arc<AtomicBool>,
}

fn run_executor(union: Arc<Mutex<ThetaUnion>>, volatile_theta: Arc<AtomicU64>, receiver: Receiver<Propagation>) {
    for msg in receiver {
        let snapshot = CompactThetaSketch::from_parts(msg.theta, msg.seed_hash, msg.is_empty, false, msg.hashes);
        {
            let mut union = union.lock().expect("shared sketch mutex poisoned");
            // The seed hash can only mismatch if a local was built against a
            // different shared sketch, which `new_local` never allows.
            union.update(&snapshot).ok();
            volatile_theta.store(union.current_theta(), Ordering::Release);
        }
        msg.in_flight.store(false, Ordering::Release);
    }
}

/// The shared sketch fed by many [`ConcurrentLocalThetaSketch`] buffers.
///
/// Reads (`estimate`, `compact`, ...) take the same mutex the executor uses
/// to merge propagations, so a reader always sees a theta/retained-count
/// pair produced by one consistent merge rather than a torn mix of two.
pub struct ConcurrentSharedThetaSketch {
    union: Arc<Mutex<ThetaUnion>>,
    volatile_theta: Arc<AtomicU64>,
    seed: u64,
    sender: Option<Sender<Propagation>>,
    executor: Option<JoinHandle<()>>,
}

impl ConcurrentSharedThetaSketch {
    /// Starts a new builder.
    pub fn builder() -> ConcurrentSharedThetaSketchBuilder {
        ConcurrentSharedThetaSketchBuilder::default()
    }

    /// Creates a shared sketch with the default nominal size and seed.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a local buffer that propagates into this shared sketch.
    ///
    /// `local_lg_k` controls the local buffer's own nominal size;
    /// `max_concurrency_error` is a factor in `[0, 1)` that lets the
    /// propagation threshold exceed the strict minimum, trading recency of
    /// the shared estimate for fewer propagations.
    ///
    /// # Panics
    ///
    /// Panics if `local_lg_k` is out of range or `max_concurrency_error` is
    /// not in `[0, 1)`.
    pub fn new_local(&self, local_lg_k: u8, max_concurrency_error: f32) -> ConcurrentLocalThetaSketch {
        validate_lg_k(local_lg_k).unwrap_or_else(|e| panic!("{e}"));
        assert!(
            (0.0..1.0).contains(&max_concurrency_error),
            "max_concurrency_error must be in [0, 1), got {max_concurrency_error}"
        );

        let local_k = 1u64 << local_lg_k;
        let propagation_threshold =
            ((local_k as f64) / (1.0 - max_concurrency_error as f64)).round() as usize;

        ConcurrentLocalThetaSketch {
            table: ThetaHashTable::new(ThetaFamily::QuickSelect, local_lg_k, ResizeFactor::X8, 1.0, self.seed),
            sender: self.sender.clone().expect("shared sketch executor still running"),
            volatile_theta: Arc::clone(&self.volatile_theta),
            in_flight: Arc::new(AtomicBool::new(false)),
            propagation_threshold,
        }
    }

    /// The shared sketch's current cardinality estimate.
    pub fn estimate(&self) -> f64 {
        self.snapshot().estimate()
    }

    /// Number of hashes currently retained by the shared sketch.
    pub fn num_retained(&self) -> usize {
        self.union.lock().expect("shared sketch mutex poisoned").get_result(false).num_retained()
    }

    /// Current volatile theta, normalized to `(0.0, 1.0]`.
    ///
    /// Lock-free: reads the same atomic a local buffer's update path reads.
    pub fn theta(&self) -> f64 {
        self.volatile_theta.load(Ordering::Acquire) as f64 / MAX_THETA as f64
    }

    /// Takes an immutable, compact snapshot of the shared sketch's current
    /// state.
    pub fn snapshot(&self) -> CompactThetaSketch {
        self.union.lock().expect("shared sketch mutex poisoned").get_result(true)
    }

    /// Blocks until every in-flight and already-enqueued propagation has
    /// been merged, then stops the executor thread.
    ///
    /// Any [`ConcurrentLocalThetaSketch`] still holding a sender clone keeps
    /// the executor alive; callers must drop or
    /// [`flush`](ConcurrentLocalThetaSketch::flush) their locals first.
    pub fn shutdown(mut self) {
        self.sender.take();
        if let Some(handle) = self.executor.take() {
            let _ = handle.join();
        }
    }
}

impl Default for ConcurrentSharedThetaSketch {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConcurrentSharedThetaSketch {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.executor.take() {
            let _ = handle.join();
        }
    }
}

/// Builder for [`ConcurrentSharedThetaSketch`].
pub struct ConcurrentSharedThetaSketchBuilder {
    lg_k: u8,
    seed: u64,
}

impl Default for ConcurrentSharedThetaSketchBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ConcurrentSharedThetaSketchBuilder {
    /// Sets log2 of the shared sketch's nominal size.
    ///
    /// # Panics
    ///
    /// Panics if `lg_k` is not in `[4, 26]`.
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        validate_lg_k(lg_k).unwrap_or_else(|e| panic!("{e}"));
        self.lg_k = lg_k;
        self
    }

    /// Sets the hash seed every local buffer will be built with.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the shared sketch and spawns its propagation executor.
    pub fn build(self) -> ConcurrentSharedThetaSketch {
        let union = Arc::new(Mutex::new(ThetaUnion::builder().lg_k(self.lg_k).seed(self.seed).build()));
        let volatile_theta = Arc::new(AtomicU64::new(MAX_THETA));
        let (sender, receiver) = crossbeam_channel::unbounded();

        let executor_union = Arc::clone(&union);
        let executor_theta = Arc::clone(&volatile_theta);
        let executor = thread::spawn(move || run_executor(executor_union, executor_theta, receiver));

        ConcurrentSharedThetaSketch {
            union,
            volatile_theta,
            seed: self.seed,
            sender: Some(sender),
            executor: Some(executor),
        }
    }
}

/// A bounded, per-thread update buffer that propagates into a
/// [`ConcurrentSharedThetaSketch`].
///
/// Not `Sync`: each local is meant to live on the one writer thread that
/// drives it. Cheap to construct, so a natural pattern is one local per
/// writer thread, created from the shared sketch at thread spawn time.
pub struct ConcurrentLocalThetaSketch {
    table: ThetaHashTable,
    sender: Sender<Propagation>,
    volatile_theta: Arc<AtomicU64>,
    in_flight: Arc<AtomicBool>,
    propagation_threshold: usize,
}

impl ConcurrentLocalThetaSketch {
    /// Updates the local buffer with a hashable value.
    ///
    /// Rejects the value without buffering it if the shared sketch's
    /// current volatile theta already screens it out. Returns `true` if the
    /// value was newly retained locally.
    pub fn update<T: Hash>(&mut self, value: T) -> bool {
        let hash = self.table.hash(value);
        self.update_hash(hash)
    }

    fn update_hash(&mut self, hash: u64) -> bool {
        let shared_theta = self.volatile_theta.load(Ordering::Acquire);
        if hash == 0 || hash >= shared_theta {
            return false;
        }

        let inserted = self.table.try_insert_hash(hash);
        if self.table.num_retained() >= self.propagation_threshold {
            self.try_propagate();
        }
        inserted
    }

    /// Number of hashes currently buffered locally (not yet propagated).
    pub fn num_retained(&self) -> usize {
        self.table.num_retained()
    }

    /// Attempts to ship the local buffer to the shared sketch's executor
    /// and reset it. A no-op if a previous propagation from this local is
    /// still in flight: the local keeps buffering past its threshold rather
    /// than blocking the writer thread.
    fn try_propagate(&mut self) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let hashes: Vec<u64> = self.table.iter().collect();
        let msg = Propagation {
            hashes,
            theta: self.table.theta(),
            is_empty: self.table.is_empty(),
            seed_hash: self.table.seed_hash(),
            in_flight: Arc::clone(&self.in_flight),
        };
        if self.sender.send(msg).is_ok() {
            self.table.reset();
        } else {
            // Executor already shut down; drop the claim so a later flush
            // doesn't spin forever waiting for an in-flight send that will
            // never land.
            self.in_flight.store(false, Ordering::Release);
        }
    }

    /// Forces an immediate propagation of whatever is buffered, regardless
    /// of the threshold, blocking until any already in-flight propagation
    /// from this local clears first.
    ///
    /// Intended for orderly shutdown and for tests that need a
    /// deterministic view of the shared sketch after a burst of writes.
    pub fn flush(&mut self) {
        while self.in_flight.load(Ordering::Acquire) {
            thread::yield_now();
        }
        if self.table.num_retained() > 0 || !self.table.is_empty() {
            self.in_flight.store(true, Ordering::Release);
            let hashes: Vec<u64> = self.table.iter().collect();
            let msg = Propagation {
                hashes,
                theta: self.table.theta(),
                is_empty: self.table.is_empty(),
                seed_hash: self.table.seed_hash(),
                in_flight: Arc::clone(&self.in_flight),
            };
            if self.sender.send(msg).is_ok() {
                self.table.reset();
            } else {
                self.in_flight.store(false, Ordering::Release);
            }
        }
    }
}

impl Drop for ConcurrentLocalThetaSketch {
    fn drop(&mut self) {
        self.flush();
    }
}
