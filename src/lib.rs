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

//! Theta sketches: approximate distinct-counting over large multisets with
//! mergeable set operations.
//!
//! ```
//! use theta_sketch::theta::ThetaSketch;
//!
//! let mut sketch = ThetaSketch::builder().lg_k(12).build();
//! for i in 0..10_000u64 {
//!     sketch.update(i);
//! }
//! assert!((sketch.estimate() - 10_000.0).abs() / 10_000.0 < 0.05);
//! ```
//!
//! [`theta::ThetaSketch`] is the mutable update sketch. [`theta::ThetaUnion`],
//! [`theta::ThetaIntersection`], and [`theta::ThetaANotB`] combine sketches
//! built with the same hash seed; [`theta::pairwise_union`],
//! [`theta::pairwise_intersect`], and [`theta::pairwise_a_not_b`] do the same
//! in one merge-join pass over already-ordered compact sketches.
//! [`theta::ConcurrentSharedThetaSketch`]/[`theta::ConcurrentLocalThetaSketch`]
//! support many writer threads feeding one estimator.

pub(crate) mod codec;
pub mod common;
pub mod error;
pub(crate) mod hash;
pub mod theta;
