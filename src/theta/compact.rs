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

//! The immutable, compact sketch form produced by
//! [`crate::theta::ThetaSketch::compact`] and by every set operation's
//! `get_result`.
//!
//! [`CompactThetaSketch`] owns its hashes. [`CompactThetaSketchView`] wraps a
//! caller-supplied byte buffer (serialized form) without copying it,
//! decoding the preamble eagerly and the hash array lazily; this is the
//! "direct"/"foreign memory" form of the reference implementations, done
//! with a borrow instead of an unsafe raw pointer.

use crate::codec::{ByteRegion, SketchBytes, SketchSlice};
use crate::error::Error;
use crate::hash::compute_seed_hash;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::serialization::{
    family_name, validate_serial_version, FAMILY_COMPACT, FLAG_HAS_SINGLE_ITEM, FLAG_IS_COMPACT,
    FLAG_IS_EMPTY, FLAG_IS_ORDERED, FLAG_IS_READ_ONLY, HASH_SIZE_BYTES, PREAMBLE_LONGS_EMPTY,
    PREAMBLE_LONGS_ESTIMATION, PREAMBLE_LONGS_EXACT, SERIAL_VERSION_1,
    SERIAL_VERSION_1_PREAMBLE_LONGS, SERIAL_VERSION_2, SERIAL_VERSION_3,
};
use crate::theta::ThetaSketchView;

/// Parsed preamble, shared by the owned and borrowed decoders.
struct Preamble {
    theta: u64,
    seed_hash: u16,
    is_empty: bool,
    is_ordered: bool,
    num_entries: usize,
    header_bytes: usize,
}

fn decode_preamble(bytes: &[u8]) -> Result<Preamble, Error> {
    let mut slice = SketchSlice::new(bytes);
    let preamble_longs = slice.read_u8().map_err(Error::insufficient_data)?;
    let serial_version = slice.read_u8().map_err(Error::insufficient_data)?;
    validate_serial_version(serial_version)?;
    let family_id = slice.read_u8().map_err(Error::insufficient_data)?;
    if family_id != FAMILY_COMPACT {
        return Err(Error::invalid_family(FAMILY_COMPACT, family_id, family_name(FAMILY_COMPACT)));
    }

    if serial_version == SERIAL_VERSION_1 || serial_version == SERIAL_VERSION_2 {
        return decode_legacy_preamble(slice, preamble_longs, serial_version);
    }

    let _lg_nom_size = slice.read_u8().map_err(Error::insufficient_data)?;
    let flags = slice.read_u8().map_err(Error::insufficient_data)?;
    let _reserved = slice.read_u8().map_err(Error::insufficient_data)?;
    let seed_hash = slice.read_u16_le().map_err(Error::insufficient_data)?;

    let is_empty = flags & FLAG_IS_EMPTY != 0;
    let is_ordered = flags & FLAG_IS_ORDERED != 0;
    let has_single_item = flags & FLAG_HAS_SINGLE_ITEM != 0;

    if is_empty {
        return Ok(Preamble {
            theta: MAX_THETA,
            seed_hash,
            is_empty: true,
            is_ordered: true,
            num_entries: 0,
            header_bytes: 8,
        });
    }

    if has_single_item {
        return Ok(Preamble {
            theta: MAX_THETA,
            seed_hash,
            is_empty: false,
            is_ordered: true,
            num_entries: 1,
            header_bytes: 8,
        });
    }

    match preamble_longs {
        v if v == PREAMBLE_LONGS_EXACT => {
            let num_entries = slice.read_u32_le().map_err(Error::insufficient_data)? as usize;
            Ok(Preamble {
                theta: MAX_THETA,
                seed_hash,
                is_empty: false,
                is_ordered,
                num_entries,
                header_bytes: 16,
            })
        }
        v if v == PREAMBLE_LONGS_ESTIMATION => {
            let num_entries = slice.read_u32_le().map_err(Error::insufficient_data)? as usize;
            let theta = slice.read_u64_le().map_err(Error::insufficient_data)?;
            Ok(Preamble {
                theta,
                seed_hash,
                is_empty: false,
                is_ordered,
                num_entries,
                header_bytes: 24,
            })
        }
        v if v == PREAMBLE_LONGS_EMPTY => Err(Error::malformed_header(
            "preamble says 1 long but the empty flag is not set",
        )),
        other => Err(Error::malformed_header(format!(
            "unsupported preamble_longs value: {other}"
        ))),
    }
}

/// Decodes a SerVer 1 ("SetSketch") or SerVer 2 preamble and upconverts it
/// to the in-memory form `decode_preamble` produces for SerVer 3.
///
/// Both legacy versions lay out the header byte-for-byte the same way:
/// `lgNomLongs` (byte 3), `lgArrLongs` (byte 4, unused by a compact sketch),
/// `flags` (byte 5), seed hash (bytes 6-7). An empty sketch is the 8-byte
/// form alone; a non-empty one always carries the full 24-byte "SetSketch"
/// preamble — retained count and sampling `p` as 32-bit words, then a
/// 64-bit theta — even in exact mode, unlike SerVer 3's shorter 2-word
/// exact-mode form.
fn decode_legacy_preamble(
    mut slice: SketchSlice<'_>,
    preamble_longs: u8,
    serial_version: u8,
) -> Result<Preamble, Error> {
    let _lg_nom_longs = slice.read_u8().map_err(Error::insufficient_data)?;
    let _lg_arr_longs = slice.read_u8().map_err(Error::insufficient_data)?;
    let flags = slice.read_u8().map_err(Error::insufficient_data)?;
    let seed_hash = slice.read_u16_le().map_err(Error::insufficient_data)?;

    let is_empty = flags & FLAG_IS_EMPTY != 0;

    if preamble_longs == PREAMBLE_LONGS_EMPTY {
        if !is_empty {
            return Err(Error::malformed_header(
                "legacy preamble says 1 long but the empty flag is not set",
            ));
        }
        return Ok(Preamble {
            theta: MAX_THETA,
            seed_hash,
            is_empty: true,
            is_ordered: true,
            num_entries: 0,
            header_bytes: 8,
        });
    }

    if serial_version == SERIAL_VERSION_1 && flags & (FLAG_IS_COMPACT | FLAG_IS_ORDERED) != (FLAG_IS_COMPACT | FLAG_IS_ORDERED) {
        return Err(Error::malformed_header(
            "SerVer 1 \"SetSketch\" preamble must have the compact and ordered flags set",
        ));
    }

    if preamble_longs != SERIAL_VERSION_1_PREAMBLE_LONGS {
        return Err(Error::malformed_header(format!(
            "unsupported legacy preamble_longs value: {preamble_longs}"
        )));
    }

    let num_entries = slice.read_u32_le().map_err(Error::insufficient_data)? as usize;
    let _sampling_p = slice.read_u32_le().map_err(Error::insufficient_data)?;
    let theta = slice.read_u64_le().map_err(Error::insufficient_data)?;

    Ok(Preamble {
        theta,
        seed_hash,
        is_empty: false,
        is_ordered: true,
        num_entries,
        header_bytes: 24,
    })
}

fn read_hashes(bytes: &[u8], header_bytes: usize, num_entries: usize) -> Result<Vec<u64>, Error> {
    let mut slice = SketchSlice::new(&bytes[header_bytes..]);
    let mut hashes = Vec::with_capacity(num_entries);
    for _ in 0..num_entries {
        hashes.push(slice.read_u64_le().map_err(Error::insufficient_data)?);
    }
    Ok(hashes)
}

fn encode(theta: u64, seed_hash: u16, is_empty: bool, is_ordered: bool, hashes: &[u64]) -> Vec<u8> {
    let mut out = SketchBytes::with_capacity(24 + hashes.len() * HASH_SIZE_BYTES);

    if is_empty {
        out.write_u8(PREAMBLE_LONGS_EMPTY);
        out.write_u8(SERIAL_VERSION_3);
        out.write_u8(FAMILY_COMPACT);
        out.write_u8(0);
        out.write_u8(FLAG_IS_COMPACT | FLAG_IS_READ_ONLY | FLAG_IS_EMPTY | FLAG_IS_ORDERED);
        out.write_u8(0);
        out.write_u16_le(seed_hash);
        return out.into_bytes();
    }

    if hashes.len() == 1 && theta >= MAX_THETA {
        out.write_u8(PREAMBLE_LONGS_EMPTY);
        out.write_u8(SERIAL_VERSION_3);
        out.write_u8(FAMILY_COMPACT);
        out.write_u8(0);
        out.write_u8(FLAG_IS_COMPACT | FLAG_IS_READ_ONLY | FLAG_IS_ORDERED | FLAG_HAS_SINGLE_ITEM);
        out.write_u8(0);
        out.write_u16_le(seed_hash);
        out.write_u64_le(hashes[0]);
        return out.into_bytes();
    }

    let mut flags = FLAG_IS_COMPACT | FLAG_IS_READ_ONLY;
    if is_ordered {
        flags |= FLAG_IS_ORDERED;
    }

    if theta >= MAX_THETA {
        out.write_u8(PREAMBLE_LONGS_EXACT);
        out.write_u8(SERIAL_VERSION_3);
        out.write_u8(FAMILY_COMPACT);
        out.write_u8(0);
        out.write_u8(flags);
        out.write_u8(0);
        out.write_u16_le(seed_hash);
        out.write_u32_le(hashes.len() as u32);
        out.write_u32_le(0);
    } else {
        out.write_u8(PREAMBLE_LONGS_ESTIMATION);
        out.write_u8(SERIAL_VERSION_3);
        out.write_u8(FAMILY_COMPACT);
        out.write_u8(0);
        out.write_u8(flags);
        out.write_u8(0);
        out.write_u16_le(seed_hash);
        out.write_u32_le(hashes.len() as u32);
        out.write_u32_le(0);
        out.write_u64_le(theta);
    }

    for &h in hashes {
        out.write_u64_le(h);
    }
    out.into_bytes()
}

/// An owned, immutable compact sketch.
#[derive(Debug, Clone)]
pub struct CompactThetaSketch {
    theta: u64,
    seed_hash: u16,
    is_empty: bool,
    is_ordered: bool,
    hashes: Vec<u64>,
}

impl CompactThetaSketch {
    pub(crate) fn from_parts(
        theta: u64,
        seed_hash: u16,
        is_empty: bool,
        ordered: bool,
        mut hashes: Vec<u64>,
    ) -> Self {
        if ordered {
            hashes.sort_unstable();
        }
        Self {
            theta,
            seed_hash,
            is_empty,
            is_ordered: ordered,
            hashes,
        }
    }

    /// Decodes a sketch by copying `bytes` into owned storage.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let preamble = decode_preamble(bytes)?;
        let hashes = read_hashes(bytes, preamble.header_bytes, preamble.num_entries)?;
        Ok(Self {
            theta: preamble.theta,
            seed_hash: preamble.seed_hash,
            is_empty: preamble.is_empty,
            is_ordered: preamble.is_ordered,
            hashes,
        })
    }

    /// Encodes this sketch to its SerVer 3 wire format.
    pub fn serialize(&self) -> Vec<u8> {
        encode(self.theta, self.seed_hash, self.is_empty, self.is_ordered, &self.hashes)
    }

    /// Borrows `bytes` instead of copying them; the sketch stays valid only
    /// as long as the caller keeps `bytes` alive and unmodified.
    pub fn wrap(bytes: &[u8]) -> Result<CompactThetaSketchView<'_>, Error> {
        CompactThetaSketchView::wrap(bytes)
    }

    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }
}

impl ThetaSketchView for CompactThetaSketch {
    fn num_retained(&self) -> usize {
        self.hashes.len()
    }

    fn theta_long(&self) -> u64 {
        self.theta
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn hashes(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(self.hashes.iter().copied())
    }
}

/// A borrowed, read-only view over a serialized compact sketch.
///
/// Mirrors [`CompactThetaSketch`] but never copies the hash array: it reads
/// straight out of the caller's buffer on every [`ThetaSketchView::hashes`]
/// call.
#[derive(Debug)]
pub struct CompactThetaSketchView<'a> {
    theta: u64,
    seed_hash: u16,
    is_empty: bool,
    is_ordered: bool,
    num_entries: usize,
    header_bytes: usize,
    region: ByteRegion<'a>,
}

impl<'a> CompactThetaSketchView<'a> {
    pub fn wrap(bytes: &'a [u8]) -> Result<Self, Error> {
        let preamble = decode_preamble(bytes)?;
        let expected_len = preamble.header_bytes + preamble.num_entries * HASH_SIZE_BYTES;
        if bytes.len() < expected_len {
            return Err(Error::insufficient_data(format!(
                "need {expected_len} bytes, have {}",
                bytes.len()
            )));
        }
        Ok(Self {
            theta: preamble.theta,
            seed_hash: preamble.seed_hash,
            is_empty: preamble.is_empty,
            is_ordered: preamble.is_ordered,
            num_entries: preamble.num_entries,
            header_bytes: preamble.header_bytes,
            region: ByteRegion::Borrowed(bytes),
        })
    }

    /// Copies this view into an owned, independent sketch.
    pub fn to_owned_sketch(&self) -> CompactThetaSketch {
        let hashes = read_hashes(self.region.as_slice(), self.header_bytes, self.num_entries)
            .expect("already validated at wrap() time");
        CompactThetaSketch::from_parts(self.theta, self.seed_hash, self.is_empty, self.is_ordered, hashes)
    }
}

impl ThetaSketchView for CompactThetaSketchView<'_> {
    fn num_retained(&self) -> usize {
        self.num_entries
    }

    fn theta_long(&self) -> u64 {
        self.theta
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn hashes(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        let hashes = read_hashes(self.region.as_slice(), self.header_bytes, self.num_entries)
            .expect("already validated at wrap() time");
        Box::new(hashes.into_iter())
    }
}

/// Computes this crate's 16-bit fingerprint for `seed`, for callers who need
/// to pre-check two sketches' seed compatibility before combining them.
pub fn seed_hash_for(seed: u64) -> u16 {
    compute_seed_hash(seed)
}

/// Equality by `(empty, theta, retained hashes as multiset)`: two sketches
/// with the same retained hashes in different orders (one ordered, one not)
/// still compare equal.
fn theta_multiset_eq<A: ThetaSketchView, B: ThetaSketchView>(a: &A, b: &B) -> bool {
    if a.is_empty() != b.is_empty() || a.theta_long() != b.theta_long() {
        return false;
    }
    let mut a_hashes: Vec<u64> = a.hashes().collect();
    let mut b_hashes: Vec<u64> = b.hashes().collect();
    a_hashes.sort_unstable();
    b_hashes.sort_unstable();
    a_hashes == b_hashes
}

impl PartialEq for CompactThetaSketch {
    fn eq(&self, other: &Self) -> bool {
        theta_multiset_eq(self, other)
    }
}

impl Eq for CompactThetaSketch {}

impl PartialEq for CompactThetaSketchView<'_> {
    fn eq(&self, other: &Self) -> bool {
        theta_multiset_eq(self, other)
    }
}

impl Eq for CompactThetaSketchView<'_> {}

impl PartialEq<CompactThetaSketch> for CompactThetaSketchView<'_> {
    fn eq(&self, other: &CompactThetaSketch) -> bool {
        theta_multiset_eq(self, other)
    }
}

impl PartialEq<CompactThetaSketchView<'_>> for CompactThetaSketch {
    fn eq(&self, other: &CompactThetaSketchView<'_>) -> bool {
        theta_multiset_eq(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompactThetaSketch {
        CompactThetaSketch::from_parts(MAX_THETA / 4, 0xABCD, false, true, vec![10, 5, 30, 1])
    }

    #[test]
    fn from_parts_sorts_when_ordered() {
        let sketch = sample();
        let hashes: Vec<u64> = sketch.hashes().collect();
        assert_eq!(hashes, vec![1, 5, 10, 30]);
    }

    #[test]
    fn empty_sketch_round_trips() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, 7, true, true, vec![]);
        let bytes = sketch.serialize();
        let back = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.num_retained(), 0);
        assert_eq!(back.seed_hash(), 7);
    }

    #[test]
    fn single_item_sketch_round_trips_via_short_form() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, 7, false, true, vec![42]);
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 16);
        let back = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert_eq!(back.num_retained(), 1);
        assert_eq!(back.hashes().collect::<Vec<_>>(), vec![42]);
    }

    #[test]
    fn estimation_mode_sketch_round_trips() {
        let sketch = sample();
        let bytes = sketch.serialize();
        let back = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert_eq!(back, sketch);
    }

    #[test]
    fn wrap_reads_without_copying_and_matches_owned_decode() {
        let sketch = sample();
        let bytes = sketch.serialize();
        let view = CompactThetaSketchView::wrap(&bytes).unwrap();
        assert_eq!(view.num_retained(), 4);
        assert_eq!(view, sketch);
        let owned = view.to_owned_sketch();
        assert_eq!(owned, sketch);
    }

    #[test]
    fn equality_is_order_independent_multiset_comparison() {
        let ordered = CompactThetaSketch::from_parts(MAX_THETA / 4, 0xABCD, false, true, vec![10, 5, 30, 1]);
        let unordered = CompactThetaSketch::from_parts(MAX_THETA / 4, 0xABCD, false, false, vec![30, 1, 10, 5]);
        assert_eq!(ordered, unordered);

        let different_theta = CompactThetaSketch::from_parts(MAX_THETA / 2, 0xABCD, false, true, vec![1, 5, 10, 30]);
        assert_ne!(ordered, different_theta);

        let different_hashes = CompactThetaSketch::from_parts(MAX_THETA / 4, 0xABCD, false, true, vec![1, 5, 10, 31]);
        assert_ne!(ordered, different_hashes);
    }

    #[test]
    fn deserialize_rejects_wrong_family() {
        let mut bytes = sample().serialize();
        bytes[2] = 9;
        assert!(CompactThetaSketch::deserialize(&bytes).is_err());
    }

    fn legacy_empty_bytes(serial_version: u8, seed_hash: u16) -> Vec<u8> {
        let mut bytes = vec![
            PREAMBLE_LONGS_EMPTY,
            serial_version,
            FAMILY_COMPACT,
            0,
            0,
            FLAG_IS_COMPACT | FLAG_IS_ORDERED | FLAG_IS_EMPTY,
        ];
        bytes.extend_from_slice(&seed_hash.to_le_bytes());
        bytes
    }

    fn legacy_set_sketch_bytes(serial_version: u8, seed_hash: u16, theta: u64, hashes: &[u64]) -> Vec<u8> {
        let mut bytes = vec![
            PREAMBLE_LONGS_ESTIMATION,
            serial_version,
            FAMILY_COMPACT,
            12, // lgNomLongs, unused by a compact sketch
            4,  // lgArrLongs, unused by a compact sketch
            FLAG_IS_COMPACT | FLAG_IS_ORDERED,
        ];
        bytes.extend_from_slice(&seed_hash.to_le_bytes());
        bytes.extend_from_slice(&(hashes.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes()); // sampling p, unused here
        bytes.extend_from_slice(&theta.to_le_bytes());
        for h in hashes {
            bytes.extend_from_slice(&h.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn deserialize_upconverts_serial_version_1_empty_sketch() {
        let bytes = legacy_empty_bytes(SERIAL_VERSION_1, 0x1234);
        assert_eq!(bytes.len(), 8);
        let sketch = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert!(sketch.is_empty());
        assert_eq!(sketch.num_retained(), 0);
        assert_eq!(sketch.seed_hash(), 0x1234);
    }

    #[test]
    fn deserialize_upconverts_genuine_serial_version_1_set_sketch() {
        let bytes = legacy_set_sketch_bytes(SERIAL_VERSION_1, 0xABCD, MAX_THETA / 2, &[1, 5, 10, 30]);
        assert_eq!(bytes.len(), 24 + 4 * 8, "SerVer 1 always carries the full 24-byte preamble");

        let sketch = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert!(!sketch.is_empty());
        assert_eq!(sketch.seed_hash(), 0xABCD);
        assert_eq!(sketch.theta_long(), MAX_THETA / 2);
        assert_eq!(sketch.hashes().collect::<Vec<_>>(), vec![1, 5, 10, 30]);

        // Round-trips through this crate's own SerVer 3 writer from here on.
        let reserialized = sketch.serialize();
        assert_eq!(reserialized[1], SERIAL_VERSION_3);
    }

    #[test]
    fn deserialize_upconverts_serial_version_2_set_sketch() {
        let bytes = legacy_set_sketch_bytes(SERIAL_VERSION_2, 7, MAX_THETA, &[100, 200]);
        let sketch = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert_eq!(sketch.num_retained(), 2);
        assert_eq!(sketch.hashes().collect::<Vec<_>>(), vec![100, 200]);
    }

    #[test]
    fn deserialize_rejects_serial_version_1_missing_compact_flags() {
        let mut bytes = legacy_set_sketch_bytes(SERIAL_VERSION_1, 1, MAX_THETA, &[1]);
        bytes[5] = 0; // strip the compact/ordered flags SerVer 1 requires
        assert!(CompactThetaSketch::deserialize(&bytes).is_err());
    }

    #[test]
    fn wrap_also_upconverts_legacy_preambles() {
        let bytes = legacy_set_sketch_bytes(SERIAL_VERSION_1, 0xBEEF, MAX_THETA, &[2, 4, 6]);
        let view = CompactThetaSketchView::wrap(&bytes).unwrap();
        assert_eq!(view.hashes().collect::<Vec<_>>(), vec![2, 4, 6]);
    }
}
