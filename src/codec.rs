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

//! Byte-level primitives shared by every wire-format reader/writer.
//!
//! [`SketchBytes`]/[`SketchSlice`] are a little-endian cursor pair used to
//! build and parse preambles and data words. [`ByteRegion`] is the
//! owned-or-borrowed span that backs a compact sketch: owned heap storage for
//! sketches built in-process, or a borrowed, possibly read-only, view over a
//! caller-supplied buffer for the "direct"/"foreign memory" forms.

use std::io;
use std::io::{Cursor, Read};

pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    pub fn write_u16_le(&mut self, n: u16) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_f64_le(&mut self, n: f64) {
        self.write(&n.to_le_bytes());
    }
}

pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    pub fn new(slice: &[u8]) -> SketchSlice<'_> {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// Owned-or-borrowed backing storage for a compact sketch.
///
/// A sketch carrying `Borrowed`/`BorrowedMut` does not own the bytes it
/// reads from; the caller must keep the region alive for as long as any
/// sketch views it, and must not alias it with a second, independently
/// mutated view. This mirrors the "direct"/"foreign memory" sketch forms of
/// the Java/C++ implementations, minus unsafe raw pointers: borrowing
/// through a Rust lifetime gives the same aliasing guarantee safely.
#[derive(Debug)]
pub(crate) enum ByteRegion<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
    BorrowedMut(&'a mut [u8]),
}

impl ByteRegion<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            ByteRegion::Owned(v) => v,
            ByteRegion::Borrowed(s) => s,
            ByteRegion::BorrowedMut(s) => s,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, ByteRegion::Borrowed(_))
    }

    /// Write access into the region. Returns `None` for a read-only borrow;
    /// callers surface that as [`crate::error::ErrorKind::ReadOnly`].
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            ByteRegion::Owned(v) => Some(v),
            ByteRegion::Borrowed(_) => None,
            ByteRegion::BorrowedMut(s) => Some(s),
        }
    }

    /// Whether this region still aliases the given caller-supplied buffer,
    /// i.e. whether an update sketch backed by foreign memory has not yet
    /// migrated to a fresh allocation.
    pub fn aliases(&self, other: &[u8]) -> bool {
        match self {
            ByteRegion::Owned(_) => false,
            ByteRegion::Borrowed(s) => std::ptr::eq(*s, other),
            ByteRegion::BorrowedMut(s) => std::ptr::eq(*s as &[u8], other),
        }
    }
}

impl From<Vec<u8>> for ByteRegion<'_> {
    fn from(v: Vec<u8>) -> Self {
        ByteRegion::Owned(v)
    }
}
