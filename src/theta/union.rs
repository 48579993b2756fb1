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

//! Stateful accumulating union of an arbitrary number of sketches.
//!
//! Internally a [`ThetaUnion`] is a QuickSelect update sketch plus an
//! independent `union_theta` cap: each [`update`](ThetaUnion::update) folds
//! in the hashes of its argument that are below `min(union_theta,
//! argument.theta)`, then lowers `union_theta` to that minimum. The result
//! is capped a second time at `get_result` so hashes admitted before a later,
//! lower-theta input arrived are still excluded from the final answer even
//! though they remain physically present until the inner table's own next
//! rebuild.

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::compact::CompactThetaSketch;
use crate::theta::hash_table::{
    validate_lg_k, ThetaFamily, ThetaHashTable, DEFAULT_LG_K, MAX_THETA,
};
use crate::theta::ThetaSketchView;

/// Accumulates the union of sketches fed to it one at a time via
/// [`update`](Self::update).
#[derive(Debug)]
pub struct ThetaUnion {
    table: ThetaHashTable,
    union_theta: u64,
}

impl ThetaUnion {
    /// Starts a new builder.
    pub fn builder() -> ThetaUnionBuilder {
        ThetaUnionBuilder::default()
    }

    /// Creates a union with the default nominal size and update seed.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Folds `sketch`'s hashes into the accumulator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `sketch`'s seed hash does not match this
    /// union's seed.
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        if sketch.is_empty() {
            return Ok(());
        }

        let expected = self.table.seed_hash();
        if sketch.seed_hash() != expected {
            return Err(Error::seed_mismatch(expected, sketch.seed_hash()));
        }

        self.union_theta = self.union_theta.min(sketch.theta_long());
        let cap = self.union_theta;
        for hash in sketch.hashes() {
            if hash < cap {
                self.table.try_insert_hash(hash);
            }
        }
        self.table.set_empty(false);
        Ok(())
    }

    /// Produces the union result.
    ///
    /// Always succeeds, even before the first `update` — an un-updated
    /// union's result is the empty sketch, matching a literal empty-set
    /// identity element.
    pub fn get_result(&self, ordered: bool) -> CompactThetaSketch {
        let theta = self.union_theta.min(self.table.theta());
        let hashes: Vec<u64> = self.table.iter().filter(|&h| h < theta).collect();
        CompactThetaSketch::from_parts(theta, self.table.seed_hash(), self.table.is_empty(), ordered, hashes)
    }

    /// Resets the accumulator back to the empty union.
    pub fn reset(&mut self) {
        self.table.reset();
        self.union_theta = MAX_THETA;
    }

    /// The effective theta `get_result` would use, without building a
    /// snapshot. Used by the concurrent shared sketch to republish its
    /// volatile theta after each propagation.
    pub(crate) fn current_theta(&self) -> u64 {
        self.union_theta.min(self.table.theta())
    }

    pub(crate) fn seed_hash(&self) -> u16 {
        self.table.seed_hash()
    }
}

impl Default for ThetaUnion {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ThetaUnion`].
#[derive(Debug)]
pub struct ThetaUnionBuilder {
    lg_k: u8,
    resize_factor: ResizeFactor,
    seed: u64,
}

impl Default for ThetaUnionBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaUnionBuilder {
    /// Sets log2 of the accumulator's nominal size.
    ///
    /// # Panics
    ///
    /// Panics if `lg_k` is not in `[4, 26]`.
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        validate_lg_k(lg_k).unwrap_or_else(|e| panic!("{e}"));
        self.lg_k = lg_k;
        self
    }

    /// Sets the hash-table growth step.
    pub fn resize_factor(mut self, factor: ResizeFactor) -> Self {
        self.resize_factor = factor;
        self
    }

    /// Sets the hash seed every `update`d sketch must share.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the union.
    pub fn build(self) -> ThetaUnion {
        let table = ThetaHashTable::new(
            ThetaFamily::QuickSelect,
            self.lg_k,
            self.resize_factor,
            1.0,
            self.seed,
        );
        ThetaUnion {
            table,
            union_theta: MAX_THETA,
        }
    }
}
