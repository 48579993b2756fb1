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

//! Small value types and numeric helpers shared across sketch families.

pub mod binomial_bounds;

/// Growth step for an update sketch's hash table, expressed as the
/// log2 multiple applied on each resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFactor {
    X1,
    X2,
    X4,
    X8,
}

impl ResizeFactor {
    /// log2 of the growth multiple (`0` means "grow straight to max size").
    pub fn lg_value(self) -> u8 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }

    /// Decode the 2-bit preamble field back into a resize factor.
    pub fn from_lg_value(lg: u8) -> Self {
        match lg & 0b11 {
            0 => ResizeFactor::X1,
            1 => ResizeFactor::X2,
            2 => ResizeFactor::X4,
            _ => ResizeFactor::X8,
        }
    }
}

impl Default for ResizeFactor {
    fn default() -> Self {
        ResizeFactor::X8
    }
}

/// Number of standard deviations used for a confidence bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumStdDev {
    One,
    Two,
    Three,
}

impl NumStdDev {
    pub fn as_f64(self) -> f64 {
        match self {
            NumStdDev::One => 1.0,
            NumStdDev::Two => 2.0,
            NumStdDev::Three => 3.0,
        }
    }
}

/// Canonicalizes a `f64` so that `update_f64` is reproducible across
/// languages: all NaN bit patterns collapse to one, and `-0.0` collapses to
/// `+0.0` (both are extensionally the same value for set-membership
/// purposes).
pub fn canonical_double(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}
