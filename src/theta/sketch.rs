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

//! The mutable update sketch: [`ThetaSketch`], built via [`ThetaSketchBuilder`].

use std::hash::Hash;

use crate::common::{canonical_double, NumStdDev, ResizeFactor};
use crate::error::Error;
use crate::hash::{compute_seed_hash, DEFAULT_UPDATE_SEED};
use crate::theta::compact::CompactThetaSketch;
use crate::theta::hash_table::{
    validate_lg_k, validate_sampling_probability, ThetaHashTable, DEFAULT_LG_K, MAX_LG_K,
    MAX_THETA, MIN_LG_K,
};
use crate::theta::ThetaSketchView;

pub use crate::theta::hash_table::ThetaFamily;

/// Mutable update sketch. Supports both the `QuickSelect` family (the
/// default) and the `Alpha` family; see [`ThetaSketchBuilder::family`].
#[derive(Debug)]
pub struct ThetaSketch {
    table: ThetaHashTable,
}

impl ThetaSketch {
    /// Starts a new builder.
    ///
    /// # Examples
    ///
    /// ```
    /// # use theta_sketch::theta::ThetaSketch;
    /// let sketch = ThetaSketch::builder().lg_k(12).build();
    /// assert_eq!(sketch.lg_k(), 12);
    /// ```
    pub fn builder() -> ThetaSketchBuilder {
        ThetaSketchBuilder::default()
    }

    /// Updates the sketch with a hashable value.
    ///
    /// For `f32`/`f64` use [`update_f32`](Self::update_f32)/
    /// [`update_f64`](Self::update_f64) instead, since raw floats hash
    /// inconsistently across `-0.0`/`NaN` representations.
    ///
    /// # Examples
    ///
    /// ```
    /// # use theta_sketch::theta::ThetaSketch;
    /// let mut sketch = ThetaSketch::builder().build();
    /// sketch.update("apple");
    /// assert!(sketch.estimate() >= 1.0);
    /// ```
    pub fn update<T: Hash>(&mut self, value: T) {
        let hash = self.table.hash(value);
        self.table.try_insert_hash(hash);
    }

    /// Updates the sketch with an `f64`, canonicalizing `-0.0`/`NaN` first.
    pub fn update_f64(&mut self, value: f64) {
        self.update(canonical_double(value).to_bits());
    }

    /// Updates the sketch with an `f32`.
    pub fn update_f32(&mut self, value: f32) {
        self.update_f64(value as f64);
    }

    /// log2 of the nominal size k.
    pub fn lg_k(&self) -> u8 {
        self.table.lg_nom_size()
    }

    /// The sketch's family: `QuickSelect` or `Alpha`.
    pub fn family(&self) -> ThetaFamily {
        self.table.family()
    }

    /// Whether theta has dropped below 1.0 (the table has started pruning).
    pub fn is_estimation_mode(&self) -> bool {
        self.table.theta() < MAX_THETA
    }

    /// Forces an immediate rebuild (quickselect theta reduction), even if
    /// the table is below its usual rebuild threshold.
    pub fn rebuild(&mut self) {
        self.table.trim();
    }

    /// Alias for [`rebuild`](Self::rebuild): drops retained entries down to
    /// at most `k`, matching the reference APIs' naming.
    pub fn trim(&mut self) {
        self.table.trim();
    }

    /// Resets the sketch back to its initial empty state, reusing storage.
    pub fn reset(&mut self) {
        self.table.reset();
    }

    /// Produces an immutable, compact snapshot of this sketch.
    ///
    /// `ordered` sorts the retained hashes ascending, which is required for
    /// the pairwise direct set operations and produces smaller output when
    /// the hashes compress well; unordered compaction is cheaper to build.
    ///
    /// # Examples
    ///
    /// ```
    /// # use theta_sketch::theta::ThetaSketch;
    /// let mut sketch = ThetaSketch::builder().build();
    /// sketch.update("apple");
    /// let compact = sketch.compact(true);
    /// assert_eq!(compact.num_retained(), sketch.num_retained());
    /// ```
    pub fn compact(&self, ordered: bool) -> CompactThetaSketch {
        CompactThetaSketch::from_parts(
            self.table.theta(),
            self.seed_hash(),
            self.is_empty(),
            ordered,
            self.table.iter().collect(),
        )
    }

    /// Serializes this sketch's compact form to bytes (always ordered, for
    /// maximal interoperability with the pairwise direct operations).
    pub fn serialize(&self) -> Vec<u8> {
        self.compact(true).serialize()
    }

    /// Deserializes a compact sketch's bytes back into a mutable update
    /// sketch, using the default update seed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserializes a compact sketch's bytes using an explicit seed.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHeader` if the bytes are too short or describe an
    /// unsupported family/serial version, or `InvalidArgument` if the
    /// embedded seed hash does not match `seed`.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let compact = CompactThetaSketch::deserialize(bytes)?;
        let expected_seed_hash = compute_seed_hash(seed);
        if compact.seed_hash() != expected_seed_hash {
            return Err(Error::seed_mismatch(expected_seed_hash, compact.seed_hash()));
        }

        let lg_k = ThetaHashTable::lg_size_from_count_for_rebuild(
            compact.num_retained().max(1usize << MIN_LG_K),
            1.0,
        )
        .clamp(MIN_LG_K, MAX_LG_K);

        let hashes: Vec<u64> = compact.hashes().collect();
        let table = ThetaHashTable::from_entries(lg_k, seed, compact.theta_long(), &hashes);
        Ok(ThetaSketch { table })
    }

    fn seed_hash(&self) -> u16 {
        self.table.seed_hash()
    }
}

impl ThetaSketchView for ThetaSketch {
    fn num_retained(&self) -> usize {
        self.table.num_retained()
    }

    fn theta_long(&self) -> u64 {
        self.table.theta()
    }

    fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn seed_hash(&self) -> u16 {
        self.table.seed_hash()
    }

    fn hashes(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(self.table.iter())
    }
}

// Accessors mirroring the `ThetaSketchView` trait, kept as inherent methods
// too since this is the crate's primary "front door" type and most callers
// never import the trait themselves.
impl ThetaSketch {
    pub fn estimate(&self) -> f64 {
        ThetaSketchView::estimate(self)
    }

    pub fn theta(&self) -> f64 {
        ThetaSketchView::theta(self)
    }

    pub fn theta64(&self) -> u64 {
        self.table.theta()
    }

    pub fn num_retained(&self) -> usize {
        ThetaSketchView::num_retained(self)
    }

    pub fn is_empty(&self) -> bool {
        ThetaSketchView::is_empty(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter()
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        ThetaSketchView::lower_bound(self, num_std_dev)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        ThetaSketchView::upper_bound(self, num_std_dev)
    }
}

/// Builder for [`ThetaSketch`].
#[derive(Debug)]
pub struct ThetaSketchBuilder {
    family: ThetaFamily,
    lg_k: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    seed: u64,
}

impl Default for ThetaSketchBuilder {
    fn default() -> Self {
        Self {
            family: ThetaFamily::QuickSelect,
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            sampling_probability: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaSketchBuilder {
    /// Selects the Alpha or QuickSelect family. QuickSelect is the default
    /// and the only family the set-operation accumulators use internally;
    /// Alpha trades a little extra probing for a lower relative standard
    /// error on the direct update path.
    pub fn family(mut self, family: ThetaFamily) -> Self {
        self.family = family;
        self
    }

    /// Sets log2 of the nominal size k.
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

    /// Sets the sampling probability `p`: the fraction of hashed values
    /// retained from the very first update.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in `(0.0, 1.0]`.
    pub fn sampling_probability(mut self, probability: f32) -> Self {
        validate_sampling_probability(probability).unwrap_or_else(|e| panic!("{e}"));
        self.sampling_probability = probability;
        self
    }

    /// Sets the hash seed. Two sketches can only be combined by a
    /// set-operation accumulator if they share a seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the sketch.
    pub fn build(self) -> ThetaSketch {
        let table = ThetaHashTable::new(
            self.family,
            self.lg_k,
            self.resize_factor,
            self.sampling_probability,
            self.seed,
        );
        ThetaSketch { table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sketch_is_empty_and_exact() {
        let sketch = ThetaSketch::builder().lg_k(10).build();
        assert!(sketch.is_empty());
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.estimate(), 0.0);
    }

    #[test]
    fn update_increases_estimate() {
        let mut sketch = ThetaSketch::builder().build();
        sketch.update("apple");
        assert!(!sketch.is_empty());
        assert!(sketch.estimate() >= 1.0);
    }

    #[test]
    fn duplicate_updates_do_not_inflate_the_estimate() {
        let mut sketch = ThetaSketch::builder().lg_k(10).build();
        for _ in 0..50 {
            sketch.update("same-value");
        }
        assert_eq!(sketch.num_retained(), 1);
    }

    #[test]
    fn estimate_converges_within_bounds_for_many_distinct_updates() {
        let mut sketch = ThetaSketch::builder().lg_k(12).build();
        for i in 0..100_000u64 {
            sketch.update(i);
        }
        assert!(sketch.is_estimation_mode());
        let estimate = sketch.estimate();
        let lo = sketch.lower_bound(NumStdDev::Three);
        let hi = sketch.upper_bound(NumStdDev::Three);
        assert!(lo <= estimate && estimate <= hi, "{lo} <= {estimate} <= {hi}");
        assert!((estimate - 100_000.0).abs() / 100_000.0 < 0.2);
    }

    #[test]
    fn float_updates_canonicalize_negative_zero() {
        let mut a = ThetaSketch::builder().build();
        let mut b = ThetaSketch::builder().build();
        a.update_f64(0.0);
        b.update_f64(-0.0);
        assert_eq!(a.num_retained(), b.num_retained());
    }

    #[test]
    fn serialize_round_trip_preserves_estimate() {
        let mut sketch = ThetaSketch::builder().lg_k(10).build();
        for i in 0..500u64 {
            sketch.update(i);
        }
        let bytes = sketch.serialize();
        let restored = ThetaSketch::deserialize(&bytes).unwrap();
        assert_eq!(sketch.estimate(), restored.estimate());
        assert_eq!(sketch.num_retained(), restored.num_retained());
    }

    #[test]
    fn deserialize_rejects_wrong_seed() {
        let mut sketch = ThetaSketch::builder().seed(111).build();
        sketch.update("apple");
        let bytes = sketch.serialize();
        assert!(ThetaSketch::deserialize_with_seed(&bytes, 222).is_err());
    }

    #[test]
    fn alpha_family_sketch_estimates_reasonably() {
        let mut sketch = ThetaSketch::builder()
            .family(ThetaFamily::Alpha)
            .lg_k(12)
            .build();
        for i in 0..50_000u64 {
            sketch.update(i);
        }
        let estimate = sketch.estimate();
        assert!((estimate - 50_000.0).abs() / 50_000.0 < 0.2);
    }

    #[test]
    fn reset_restores_empty_state() {
        let mut sketch = ThetaSketch::builder().build();
        sketch.update("apple");
        sketch.reset();
        assert!(sketch.is_empty());
        assert_eq!(sketch.num_retained(), 0);
    }

    #[test]
    #[should_panic(expected = "lg_k")]
    fn builder_rejects_bad_lg_k() {
        let _ = ThetaSketch::builder().lg_k(100);
    }
}
