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

//! Theta sketches: an approximate distinct-count structure that also
//! supports approximate set operations (union, intersection, a-not-b) over
//! multiple sketches built with the same hash seed.

mod compact;
mod concurrent;
mod hash_table;
mod intersection;
mod serialization;
mod set_ops;
mod sketch;
mod union;

pub use compact::{CompactThetaSketch, CompactThetaSketchView};
pub use concurrent::{ConcurrentLocalThetaSketch, ConcurrentSharedThetaSketch};
pub use hash_table::{DEFAULT_LG_K, MAX_LG_K, MAX_THETA, MIN_LG_K};
pub use intersection::ThetaIntersection;
pub use set_ops::{pairwise_a_not_b, pairwise_intersect, pairwise_union, ThetaANotB};
pub use sketch::{ThetaFamily, ThetaSketch, ThetaSketchBuilder};
pub use union::ThetaUnion;

use crate::common::NumStdDev;
use crate::common::binomial_bounds;

/// Common read-only capabilities shared by every sketch variant: the
/// mutable update sketch, both compact forms, and the set-operation
/// accumulators. The set-operation engine is written against this trait so
/// it never needs to know which concrete form it was handed.
pub trait ThetaSketchView {
    /// Number of hashes physically retained.
    fn num_retained(&self) -> usize;

    /// Current theta, as the raw 63-bit threshold (not yet normalized).
    fn theta_long(&self) -> u64;

    /// Whether the *source* multiset is logically empty (distinct from
    /// `num_retained() == 0`, which can also happen when every update was
    /// screened out by a very small theta).
    fn is_empty(&self) -> bool;

    /// Whether the retained hashes are produced in ascending order.
    fn is_ordered(&self) -> bool;

    /// 16-bit fingerprint of the hash seed, used to reject cross-seed set
    /// operations.
    fn seed_hash(&self) -> u16;

    /// Iterates the retained hashes. Ascending order only if
    /// [`ThetaSketchView::is_ordered`] is `true`.
    fn hashes(&self) -> Box<dyn Iterator<Item = u64> + '_>;

    /// Theta normalized to `(0.0, 1.0]`.
    fn theta(&self) -> f64 {
        self.theta_long() as f64 / MAX_THETA as f64
    }

    /// Unbiased cardinality estimate: `num_retained / theta`.
    fn estimate(&self) -> f64 {
        if self.theta_long() >= MAX_THETA {
            self.num_retained() as f64
        } else {
            self.num_retained() as f64 / self.theta()
        }
    }

    /// Lower confidence bound on the cardinality estimate.
    fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        binomial_bounds::lower_bound(self.num_retained() as u64, self.theta(), num_std_dev)
            .unwrap_or(0.0)
    }

    /// Upper confidence bound on the cardinality estimate.
    fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        binomial_bounds::upper_bound(
            self.num_retained() as u64,
            self.theta(),
            num_std_dev,
            self.is_empty(),
        )
        .unwrap_or(0.0)
    }
}
