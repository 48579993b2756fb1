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

//! Binary serialization format constants for Theta sketches.
//!
//! Readers accept SerVer 1 (24-byte "SetSketch" preamble), SerVer 2, and the
//! current SerVer 3; writers always emit SerVer 3.

use crate::error::Error;

/// Family IDs, matching the reference implementations' family registry.
pub const FAMILY_ALPHA: u8 = 1;
pub const FAMILY_QUICKSELECT: u8 = 2;
pub const FAMILY_COMPACT: u8 = 3;
pub const FAMILY_UNION: u8 = 4;
pub const FAMILY_INTERSECTION: u8 = 5;
pub const FAMILY_A_NOT_B: u8 = 6;

pub const SERIAL_VERSION_1: u8 = 1;
pub const SERIAL_VERSION_2: u8 = 2;
pub const SERIAL_VERSION_3: u8 = 3;

/// Preamble size for empty sketch (8 bytes = 1 long).
pub const PREAMBLE_LONGS_EMPTY: u8 = 1;
/// Preamble size for exact/single-item sketch (16 bytes = 2 longs).
pub const PREAMBLE_LONGS_EXACT: u8 = 2;
/// Preamble size for estimation mode sketch (24 bytes = 3 longs).
pub const PREAMBLE_LONGS_ESTIMATION: u8 = 3;

/// Fixed preamble size of a non-empty SerVer 1/2 "SetSketch" preamble, in
/// 8-byte longs; unlike SerVer 3 there is no shorter exact-mode form.
pub const SERIAL_VERSION_1_PREAMBLE_LONGS: u8 = 3;

// Flags (byte 5) - bit masks
/// Flag: data is in big-endian format (we always write little-endian).
#[allow(dead_code)]
pub const FLAG_IS_BIG_ENDIAN: u8 = 1 << 0;
/// Flag: sketch is read-only (compact sketches are read-only).
pub const FLAG_IS_READ_ONLY: u8 = 1 << 1;
/// Flag: sketch is empty.
pub const FLAG_IS_EMPTY: u8 = 1 << 2;
/// Flag: sketch is in compact format.
pub const FLAG_IS_COMPACT: u8 = 1 << 3;
/// Flag: hash values are ordered (sorted).
pub const FLAG_IS_ORDERED: u8 = 1 << 4;
/// Flag: sketch contains a single item (special case).
pub const FLAG_HAS_SINGLE_ITEM: u8 = 1 << 5;

/// Size of a single hash entry in bytes (u64).
pub const HASH_SIZE_BYTES: usize = 8;

/// Maps a family byte to its name, for error messages.
pub fn family_name(family_id: u8) -> &'static str {
    match family_id {
        FAMILY_ALPHA => "Alpha",
        FAMILY_QUICKSELECT => "QuickSelect",
        FAMILY_COMPACT => "Compact",
        FAMILY_UNION => "Union",
        FAMILY_INTERSECTION => "Intersection",
        FAMILY_A_NOT_B => "ANotB",
        _ => "Unknown",
    }
}

/// Validates that a decoded serial version is one this crate understands.
pub fn validate_serial_version(serial_version: u8) -> Result<(), Error> {
    match serial_version {
        SERIAL_VERSION_1 | SERIAL_VERSION_2 | SERIAL_VERSION_3 => Ok(()),
        other => Err(Error::unsupported_serial_version(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_masks_are_distinct_powers_of_two() {
        assert_eq!(FLAG_IS_BIG_ENDIAN, 1);
        assert_eq!(FLAG_IS_READ_ONLY, 2);
        assert_eq!(FLAG_IS_EMPTY, 4);
        assert_eq!(FLAG_IS_COMPACT, 8);
        assert_eq!(FLAG_IS_ORDERED, 16);
        assert_eq!(FLAG_HAS_SINGLE_ITEM, 32);
    }

    #[test]
    fn family_ids_are_distinct() {
        let ids = [
            FAMILY_ALPHA,
            FAMILY_QUICKSELECT,
            FAMILY_COMPACT,
            FAMILY_UNION,
            FAMILY_INTERSECTION,
            FAMILY_A_NOT_B,
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn validate_serial_version_accepts_one_two_three() {
        assert!(validate_serial_version(1).is_ok());
        assert!(validate_serial_version(2).is_ok());
        assert!(validate_serial_version(3).is_ok());
        assert!(validate_serial_version(9).is_err());
    }
}
