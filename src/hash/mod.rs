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

//! The 128-bit MurmurHash3 function used to key every sketch, wrapped as a
//! `std::hash::Hasher` so generic `T: Hash` values can be fed straight to it.

use std::hash::Hasher;

/// Default update seed used by the reference DataSketches implementations.
pub const DEFAULT_UPDATE_SEED: u64 = 9001;

/// Incremental MurmurHash3_x64_128 hasher.
///
/// `std::hash::Hash::hash` calls `write`/`write_u64`/etc repeatedly; this
/// type buffers those bytes and defers the actual murmur3 mix to
/// [`finish128`], since the algorithm operates on the whole message rather
/// than a rolling state.
#[derive(Debug)]
pub struct MurmurHash3X64128 {
    seed: u64,
    buffer: Vec<u8>,
}

impl MurmurHash3X64128 {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            buffer: Vec::new(),
        }
    }

    /// Returns the full 128-bit digest as `(h1, h2)`.
    pub fn finish128(&self) -> (u64, u64) {
        mur3::murmurhash3_x64_128(&self.buffer, self.seed)
    }
}

impl Hasher for MurmurHash3X64128 {
    fn finish(&self) -> u64 {
        self.finish128().0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

/// Computes the 16-bit seed hash used to guard against combining sketches
/// that were hashed under different update seeds (spec invariant I5).
///
/// Matches the reference implementations: hash the little-endian seed bytes
/// with seed `0`, take the low 16 bits of `h1`, and never emit `0` (reserved
/// to mean "no seed hash check" in legacy wire formats).
pub fn compute_seed_hash(seed: u64) -> u16 {
    let (h1, _) = mur3::murmurhash3_x64_128(&seed.to_le_bytes(), 0);
    let seed_hash = (h1 & 0xFFFF) as u16;
    if seed_hash == 0 { 1 } else { seed_hash }
}
