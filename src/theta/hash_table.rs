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

//! Open-addressed hash table shared by the update sketch and the
//! set-operation accumulators.

use std::hash::Hash;

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::{compute_seed_hash, MurmurHash3X64128};

/// Maximum theta value (signed max for compatibility with Java/C++).
pub const MAX_THETA: u64 = i64::MAX as u64;

/// Minimum log2 of K.
pub const MIN_LG_K: u8 = 4;

/// Maximum log2 of K.
pub const MAX_LG_K: u8 = 26;

/// Default log2 of K.
pub const DEFAULT_LG_K: u8 = 12;

/// Resize threshold while the table is still growing (50% load factor).
const RESIZE_THRESHOLD: f64 = 0.5;

/// Rebuild threshold once the table has reached `lgNomLongs + 1` for the
/// QuickSelect family (15/16 load factor).
pub(crate) const REBUILD_THRESHOLD_QUICKSELECT: f64 = 15.0 / 16.0;

/// Rebuild threshold for the Alpha family: a sliding target starting at
/// `15/32 × 2^L`, i.e. an effective 15/32 load factor against the current
/// table size (half the QuickSelect load factor, trading more frequent
/// rebuilds for the lower relative standard error Alpha's continuous-theta
/// bookkeeping buys it).
pub(crate) const REBUILD_THRESHOLD_ALPHA: f64 = 15.0 / 32.0;

/// Stride hash bits used to derive the re-probe stride.
const STRIDE_HASH_BITS: u8 = 7;
const STRIDE_MASK: u64 = (1 << STRIDE_HASH_BITS) - 1;

/// Which sketch family a hash table is being grown for; only affects the
/// rebuild threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThetaFamily {
    Alpha,
    QuickSelect,
}

impl ThetaFamily {
    fn rebuild_threshold(self) -> f64 {
        match self {
            ThetaFamily::Alpha => REBUILD_THRESHOLD_ALPHA,
            ThetaFamily::QuickSelect => REBUILD_THRESHOLD_QUICKSELECT,
        }
    }
}

/// Outcome of a single-slot probe/insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    Inserted,
    Duplicate,
    InsertedEvictingStale,
}

/// Open-addressed hash table over `2^lg_cur_size` 64-bit slots backing an
/// update sketch or a set-operation accumulator.
///
/// Below `lg_nom_size + 1` slots it grows by `resize_factor` on a 50% load
/// factor; past that point every rebuild selects the `k`-th smallest
/// retained hash as the new theta and keeps only the lesser entries.
#[derive(Debug)]
pub(crate) struct ThetaHashTable {
    family: ThetaFamily,
    lg_cur_size: u8,
    lg_nom_size: u8,
    lg_max_size: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    hash_seed: u64,

    // Logical emptiness of the source set. Can be false even when
    // `num_retained == 0` (every update so far was screened by theta).
    is_empty: bool,

    theta: u64,
    entries: Vec<u64>,
    num_retained: usize,
}

impl ThetaHashTable {
    /// Creates a new table sized for `lg_nom_size` (k = 2^lg_nom_size).
    pub fn new(
        family: ThetaFamily,
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        hash_seed: u64,
    ) -> Self {
        let lg_max_size = lg_nom_size + 1;
        let lg_cur_size = starting_sub_multiple(lg_max_size, MIN_LG_K, resize_factor.lg_value());
        let theta = starting_theta_from_sampling_probability(sampling_probability);
        Self::from_raw_parts(
            family,
            lg_cur_size,
            lg_nom_size,
            resize_factor,
            sampling_probability,
            theta,
            hash_seed,
            true,
        )
    }

    /// Creates a table with fully explicit state; used by set-operation
    /// accumulators that build a scratch table directly from another
    /// sketch's retained hashes rather than growing one update at a time.
    ///
    /// # Panics
    ///
    /// Panics if `lg_cur_size > lg_nom_size + 1`.
    pub fn from_raw_parts(
        family: ThetaFamily,
        lg_cur_size: u8,
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        theta: u64,
        hash_seed: u64,
        is_empty: bool,
    ) -> Self {
        let lg_max_size = lg_nom_size + 1;
        assert!(
            lg_cur_size <= lg_max_size,
            "lg_cur_size must be <= lg_nom_size + 1, got lg_cur_size={lg_cur_size}, lg_nom_size={lg_nom_size}"
        );
        let size = 1usize << lg_cur_size;
        Self {
            family,
            lg_cur_size,
            lg_nom_size,
            lg_max_size,
            resize_factor,
            sampling_probability,
            hash_seed,
            is_empty,
            theta,
            entries: vec![0u64; size],
            num_retained: 0,
        }
    }

    /// Builds a table directly from a caller-provided hash set, e.g. while
    /// deserializing a compact sketch into a mutable working copy.
    pub fn from_entries(lg_nom_size: u8, hash_seed: u64, theta: u64, entries: &[u64]) -> Self {
        let mut table = Self::new(
            ThetaFamily::QuickSelect,
            lg_nom_size,
            ResizeFactor::X8,
            1.0,
            hash_seed,
        );
        table.theta = theta;
        table.is_empty = entries.is_empty() && theta == MAX_THETA;
        for &hash in entries {
            let _ = table.try_insert_hash(hash);
        }
        table
    }

    /// Smallest `lg_size` such that `count` entries fit under `load_factor`.
    pub fn lg_size_from_count_for_rebuild(count: usize, load_factor: f64) -> u8 {
        let mut lg = MIN_LG_K;
        while ((1u64 << lg) as f64 * load_factor) < count as f64 {
            lg += 1;
        }
        lg
    }

    /// Hashes a value with the table's seed, folding the digest into the
    /// sketch's 63-bit hash space (top bit cleared).
    pub fn hash<T: Hash>(&self, value: T) -> u64 {
        let mut hasher = MurmurHash3X64128::with_seed(self.hash_seed);
        value.hash(&mut hasher);
        let (h1, _) = hasher.finish128();
        (h1 >> 1) & MAX_THETA
    }

    fn find_in_curr_entries(&self, key: u64) -> Option<(usize, InsertOutcome)> {
        Self::find_in_entries(&self.entries, key, self.lg_cur_size, self.theta)
    }

    /// Probes for `key`, returning the slot index and what inserting there
    /// would mean (duplicate / fresh / stale-eviction).
    ///
    /// A "stale" slot holds some other hash `h' >= theta` that is no longer
    /// retained under the table's current theta. The only path that can
    /// produce one is a set-operation accumulator whose screening theta was
    /// lowered without a matching rebuild of this table; an update sketch's
    /// own theta only ever drops together with an immediate rebuild, so its
    /// own probes never observe this branch in practice. Stale entries are
    /// safe to overwrite on sight (rather than only after confirming no
    /// later duplicate exists) because any live duplicate of `key`
    /// necessarily also satisfies `key < theta`, and so can never itself
    /// look stale.
    fn find_in_entries(
        entries: &[u64],
        key: u64,
        lg_size: u8,
        theta: u64,
    ) -> Option<(usize, InsertOutcome)> {
        if entries.is_empty() {
            return None;
        }
        let size = entries.len();
        let mask = size - 1;
        let stride = Self::get_stride(key, lg_size);
        let start = (key as usize) & mask;
        let mut index = start;

        loop {
            let probe = entries[index];
            if probe == key {
                return Some((index, InsertOutcome::Duplicate));
            }
            if probe == 0 {
                return Some((index, InsertOutcome::Inserted));
            }
            if probe >= theta {
                return Some((index, InsertOutcome::InsertedEvictingStale));
            }
            index = (index + stride) & mask;
            if index == start {
                return None;
            }
        }
    }

    /// Hashes and inserts a value. Returns `true` if newly retained.
    pub fn try_insert<T: Hash>(&mut self, value: T) -> bool {
        let hash = self.hash(value);
        self.try_insert_hash(hash)
    }

    /// Inserts a pre-hashed value, screening against the table's current
    /// theta. Returns `true` if newly retained.
    pub fn try_insert_hash(&mut self, hash: u64) -> bool {
        self.is_empty = false;

        if hash == 0 || hash >= self.theta {
            return false;
        }

        let Some((index, outcome)) = self.find_in_curr_entries(hash) else {
            return false;
        };

        match outcome {
            InsertOutcome::Duplicate => return false,
            InsertOutcome::Inserted => {
                self.entries[index] = hash;
                self.num_retained += 1;
            }
            InsertOutcome::InsertedEvictingStale => {
                self.entries[index] = hash;
            }
        }

        let capacity = self.get_capacity();
        if self.num_retained > capacity {
            if self.lg_cur_size <= self.lg_nom_size {
                self.resize();
            } else {
                self.rebuild();
            }
        }
        true
    }

    fn get_capacity(&self) -> usize {
        let fraction = if self.lg_cur_size <= self.lg_nom_size {
            RESIZE_THRESHOLD
        } else {
            self.family.rebuild_threshold()
        };
        (fraction * self.entries.len() as f64) as usize
    }

    fn resize(&mut self) {
        let new_lg_size = std::cmp::min(
            self.lg_cur_size + self.resize_factor.lg_value().max(1),
            self.lg_max_size,
        );
        let new_size = 1usize << new_lg_size;
        let mut new_entries = vec![0u64; new_size];
        for &entry in &self.entries {
            if entry != 0 {
                let (idx, _) = Self::find_in_entries(&new_entries, entry, new_lg_size, MAX_THETA)
                    .expect("fresh, unfilled table always has room");
                new_entries[idx] = entry;
            }
        }
        self.entries = new_entries;
        self.lg_cur_size = new_lg_size;
    }

    /// Selects the k-th smallest retained hash as the new theta and keeps
    /// only the strictly lesser entries.
    fn rebuild(&mut self) {
        let mut live: Vec<u64> = self.entries.iter().copied().filter(|&e| e != 0).collect();
        let k = 1usize << self.lg_nom_size;
        if live.len() > k {
            let (_, &mut kth, _) = live.select_nth_unstable(k);
            self.theta = self.theta.min(kth);
        }
        self.reinsert(live);
    }

    fn reinsert(&mut self, hashes: Vec<u64>) {
        let size = 1usize << self.lg_cur_size;
        let mut new_entries = vec![0u64; size];
        let mut num_inserted = 0;
        for hash in hashes {
            if hash >= self.theta {
                continue;
            }
            let (idx, _) = Self::find_in_entries(&new_entries, hash, self.lg_cur_size, MAX_THETA)
                .expect("fresh, unfilled table always has room");
            new_entries[idx] = hash;
            num_inserted += 1;
        }
        self.num_retained = num_inserted;
        self.entries = new_entries;
    }

    /// Forces a rebuild even if below the rebuild threshold.
    pub fn trim(&mut self) {
        if self.num_retained > (1usize << self.lg_nom_size) {
            self.rebuild();
        }
    }

    /// Restores the table to its initial empty state, reusing storage.
    pub fn reset(&mut self) {
        let init_theta = starting_theta_from_sampling_probability(self.sampling_probability);
        let init_lg_cur = starting_sub_multiple(
            self.lg_nom_size + 1,
            MIN_LG_K,
            self.resize_factor.lg_value(),
        );
        if self.entries.len() != 1usize << init_lg_cur {
            self.entries = vec![0u64; 1usize << init_lg_cur];
        } else {
            self.entries.fill(0);
        }
        self.num_retained = 0;
        self.theta = init_theta;
        self.is_empty = true;
        self.lg_cur_size = init_lg_cur;
    }

    /// Number of non-zero hashes strictly below `theta_cap`.
    pub fn count_below(&self, theta_cap: u64) -> usize {
        self.entries.iter().filter(|&&e| e != 0 && e < theta_cap).count()
    }

    pub fn num_retained(&self) -> usize {
        self.num_retained
    }

    pub fn theta(&self) -> u64 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: u64) {
        self.theta = theta;
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn set_empty(&mut self, is_empty: bool) {
        self.is_empty = is_empty;
    }

    pub fn contains_hash(&self, hash: u64) -> bool {
        matches!(
            self.find_in_curr_entries(hash),
            Some((_, InsertOutcome::Duplicate))
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied().filter(|&e| e != 0)
    }

    pub fn lg_nom_size(&self) -> u8 {
        self.lg_nom_size
    }

    pub fn hash_seed(&self) -> u64 {
        self.hash_seed
    }

    pub fn seed_hash(&self) -> u16 {
        compute_seed_hash(self.hash_seed)
    }

    pub fn family(&self) -> ThetaFamily {
        self.family
    }

    fn get_stride(key: u64, lg_size: u8) -> usize {
        (2 * ((key >> lg_size) & STRIDE_MASK) + 1) as usize
    }
}

/// Computes the initial `lg_size` such that `lg_target = lg_init + n * lg_resize_factor`
/// for an integer `n`, with `lg_init >= lg_min`.
fn starting_sub_multiple(lg_target: u8, lg_min: u8, lg_resize_factor: u8) -> u8 {
    if lg_target <= lg_min {
        lg_min
    } else if lg_resize_factor == 0 {
        lg_target
    } else {
        ((lg_target - lg_min) % lg_resize_factor) + lg_min
    }
}

fn starting_theta_from_sampling_probability(sampling_probability: f32) -> u64 {
    if sampling_probability < 1.0 {
        (MAX_THETA as f64 * sampling_probability as f64) as u64
    } else {
        MAX_THETA
    }
}

/// Validates a builder-supplied `lg_k`.
pub(crate) fn validate_lg_k(lg_k: u8) -> Result<(), Error> {
    if (MIN_LG_K..=MAX_LG_K).contains(&lg_k) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "lg_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_k}"
        )))
    }
}

/// Validates a builder-supplied sampling probability `p`.
pub(crate) fn validate_sampling_probability(p: f32) -> Result<(), Error> {
    if p > 0.0 && p <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "sampling_probability must be in (0.0, 1.0], got {p}"
        )))
    }
}
