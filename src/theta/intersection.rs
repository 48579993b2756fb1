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

//! Stateful pairwise-accumulating intersection of an arbitrary number of
//! sketches.
//!
//! An intersection starts `Virgin`. The first [`ThetaIntersection::update`]
//! seeds the accumulator from that sketch; every later `update` narrows it
//! to the hashes common to everything seen so far, capped at the running
//! minimum theta. Once any input is logically empty, the result is empty
//! forever after: intersecting with nothing can never grow the set back.

use std::collections::HashSet;

use crate::error::Error;
use crate::hash::{compute_seed_hash, DEFAULT_UPDATE_SEED};
use crate::theta::compact::CompactThetaSketch;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::ThetaSketchView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Virgin,
    EmptySet,
    NonEmpty,
}

/// Accumulates the intersection of sketches fed to it one at a time via
/// [`update`](Self::update).
#[derive(Debug)]
pub struct ThetaIntersection {
    hash_seed: u64,
    state: State,
    theta: u64,
    entries: Vec<u64>,
}

impl ThetaIntersection {
    /// Creates an intersection using the default update seed.
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_UPDATE_SEED)
    }

    /// Creates an intersection keyed to a specific seed; only sketches
    /// hashed with the same seed may be passed to [`update`](Self::update).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            hash_seed: seed,
            state: State::Virgin,
            theta: MAX_THETA,
            entries: Vec::new(),
        }
    }

    /// Narrows the accumulator to the intersection with `sketch`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `sketch`'s seed hash does not match this
    /// intersection's seed.
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        let expected = self.seed_hash();
        if sketch.seed_hash() != expected {
            return Err(Error::seed_mismatch(expected, sketch.seed_hash()));
        }

        match self.state {
            State::Virgin => {
                self.theta = sketch.theta_long();
                if sketch.is_empty() {
                    self.state = State::EmptySet;
                } else {
                    self.entries = sketch.hashes().filter(|&h| h < self.theta).collect();
                    self.state = State::NonEmpty;
                }
            }
            State::EmptySet => {}
            State::NonEmpty => {
                self.theta = self.theta.min(sketch.theta_long());
                if sketch.is_empty() {
                    self.state = State::EmptySet;
                    self.entries.clear();
                } else {
                    let theta = self.theta;
                    let incoming: HashSet<u64> =
                        sketch.hashes().filter(|&h| h < theta).collect();
                    self.entries.retain(|h| *h < theta && incoming.contains(h));
                }
            }
        }
        Ok(())
    }

    /// Narrows the accumulator with a null/absent input.
    ///
    /// A null input transitions any state straight to `EMPTY_SET`: there is
    /// nothing in common with a set that was never given, so the result is
    /// forced empty regardless of what has already been folded in.
    pub fn update_null(&mut self) {
        self.entries.clear();
        self.theta = MAX_THETA;
        self.state = State::EmptySet;
    }

    /// Whether at least one sketch has been folded in.
    pub fn has_result(&self) -> bool {
        self.state != State::Virgin
    }

    /// Produces the intersection result.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if [`update`](Self::update) has never been
    /// called.
    pub fn get_result(&self, ordered: bool) -> Result<CompactThetaSketch, Error> {
        match self.state {
            State::Virgin => Err(Error::illegal_state(
                "intersection has no result before the first update",
            )),
            State::EmptySet => Ok(CompactThetaSketch::from_parts(
                MAX_THETA,
                self.seed_hash(),
                true,
                true,
                Vec::new(),
            )),
            State::NonEmpty => Ok(CompactThetaSketch::from_parts(
                self.theta,
                self.seed_hash(),
                false,
                ordered,
                self.entries.clone(),
            )),
        }
    }

    fn seed_hash(&self) -> u16 {
        compute_seed_hash(self.hash_seed)
    }
}

impl Default for ThetaIntersection {
    fn default() -> Self {
        Self::new()
    }
}
