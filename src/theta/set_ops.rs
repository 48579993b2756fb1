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

//! The stateless A-not-B operation, plus the pairwise direct variants of
//! union/intersect/A-not-B that operate on a pair of already-ordered
//! compact sketches in a single merge-join pass, without building a
//! hash-table accumulator.

use std::collections::HashSet;

use crate::error::Error;
use crate::theta::compact::CompactThetaSketch;
use crate::theta::ThetaSketchView;

/// Computes `a \ b`: the hashes in `a` that do not appear in `b`, capped at
/// `min(a.theta, b.theta)`.
///
/// Unlike [`ThetaUnion`](crate::theta::ThetaUnion) and
/// [`ThetaIntersection`](crate::theta::ThetaIntersection), A-not-B carries
/// no state across calls — each call is independent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThetaANotB;

impl ThetaANotB {
    pub fn new() -> Self {
        Self
    }

    /// Computes `a \ b`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `a` and `b` were hashed with different
    /// seeds.
    pub fn compute<A, B>(&self, a: &A, b: &B, ordered: bool) -> Result<CompactThetaSketch, Error>
    where
        A: ThetaSketchView,
        B: ThetaSketchView,
    {
        if a.seed_hash() != b.seed_hash() {
            return Err(Error::seed_mismatch(a.seed_hash(), b.seed_hash()));
        }

        let theta = a.theta_long().min(b.theta_long());
        if a.is_empty() {
            return Ok(CompactThetaSketch::from_parts(theta, a.seed_hash(), true, true, Vec::new()));
        }

        let excluded: HashSet<u64> = b.hashes().filter(|&h| h < theta).collect();
        let hashes: Vec<u64> = a
            .hashes()
            .filter(|h| *h < theta && !excluded.contains(h))
            .collect();
        Ok(CompactThetaSketch::from_parts(theta, a.seed_hash(), false, ordered, hashes))
    }
}

fn require_ordered_pair(a: &CompactThetaSketch, b: &CompactThetaSketch) -> Result<(), Error> {
    if !a.is_ordered() || !b.is_ordered() {
        return Err(Error::invalid_argument(
            "pairwise direct operations require both inputs to be ordered compact sketches",
        ));
    }
    if a.seed_hash() != b.seed_hash() {
        return Err(Error::seed_mismatch(a.seed_hash(), b.seed_hash()));
    }
    Ok(())
}

fn ordered_hashes_below(sketch: &CompactThetaSketch, theta: u64) -> Vec<u64> {
    sketch.hashes().filter(|&h| h < theta).collect()
}

/// Caps a sorted, duplicate-free hash list at `k` entries, the same
/// quickselect trim the hash table accumulator's own rebuild applies: the
/// `k`-th smallest surviving hash becomes the new theta, and only the
/// strictly lesser entries are kept. Since `merged` is already sorted, the
/// partition point is just a slice index rather than `select_nth_unstable`.
fn trim_to_k(theta: u64, k: usize, merged: Vec<u64>) -> (u64, Vec<u64>) {
    if merged.len() > k {
        let new_theta = theta.min(merged[k]);
        (new_theta, merged[..k].to_vec())
    } else {
        (theta, merged)
    }
}

/// Merge-joins two ordered compact sketches into their union, in a single
/// `O(len(a) + len(b))` pass, then trims the result to at most `k` retained
/// hashes so this is contract-equivalent to accumulating both inputs into a
/// [`ThetaUnion`](crate::theta::ThetaUnion) built with nominal size `k`.
///
/// # Errors
///
/// Returns `InvalidArgument` if either input is unordered, or if the two
/// seed hashes differ.
pub fn pairwise_union(
    a: &CompactThetaSketch,
    b: &CompactThetaSketch,
    k: usize,
) -> Result<CompactThetaSketch, Error> {
    require_ordered_pair(a, b)?;
    let theta = a.theta_long().min(b.theta_long());
    let av = ordered_hashes_below(a, theta);
    let bv = ordered_hashes_below(b, theta);

    let mut merged = Vec::with_capacity(av.len() + bv.len());
    let (mut i, mut j) = (0usize, 0usize);
    while i < av.len() && j < bv.len() {
        match av[i].cmp(&bv[j]) {
            std::cmp::Ordering::Less => {
                merged.push(av[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(bv[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(av[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&av[i..]);
    merged.extend_from_slice(&bv[j..]);

    let is_empty = a.is_empty() && b.is_empty();
    let (theta, merged) = trim_to_k(theta, k, merged);
    Ok(CompactThetaSketch::from_parts(theta, a.seed_hash(), is_empty, true, merged))
}

/// Merge-joins two ordered compact sketches into their intersection.
///
/// # Errors
///
/// Returns `InvalidArgument` if either input is unordered, or if the two
/// seed hashes differ.
pub fn pairwise_intersect(
    a: &CompactThetaSketch,
    b: &CompactThetaSketch,
) -> Result<CompactThetaSketch, Error> {
    require_ordered_pair(a, b)?;
    let theta = a.theta_long().min(b.theta_long());
    let av = ordered_hashes_below(a, theta);
    let bv = ordered_hashes_below(b, theta);

    let mut common = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < av.len() && j < bv.len() {
        match av[i].cmp(&bv[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                common.push(av[i]);
                i += 1;
                j += 1;
            }
        }
    }

    let is_empty = a.is_empty() || b.is_empty();
    Ok(CompactThetaSketch::from_parts(theta, a.seed_hash(), is_empty, true, common))
}

/// Merge-joins two ordered compact sketches into `a \ b`.
///
/// # Errors
///
/// Returns `InvalidArgument` if either input is unordered, or if the two
/// seed hashes differ.
pub fn pairwise_a_not_b(
    a: &CompactThetaSketch,
    b: &CompactThetaSketch,
) -> Result<CompactThetaSketch, Error> {
    require_ordered_pair(a, b)?;
    let theta = a.theta_long().min(b.theta_long());
    if a.is_empty() {
        return Ok(CompactThetaSketch::from_parts(theta, a.seed_hash(), true, true, Vec::new()));
    }
    let av = ordered_hashes_below(a, theta);
    let bv = ordered_hashes_below(b, theta);

    let mut remaining = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < av.len() && j < bv.len() {
        match av[i].cmp(&bv[j]) {
            std::cmp::Ordering::Less => {
                remaining.push(av[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    remaining.extend_from_slice(&av[i..]);

    Ok(CompactThetaSketch::from_parts(theta, a.seed_hash(), false, true, remaining))
}
