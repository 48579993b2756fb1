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

//! Error types for theta-sketch operations

use std::fmt;

/// ErrorKind is all kinds of Error of this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Out-of-range `k`/`p`/`resizeFactor`, unknown family, incompatible seed
    /// hashes, unordered input where ordered is required.
    InvalidArgument,
    /// A serialized preamble has unsupported or mutually inconsistent fields.
    MalformedHeader,
    /// A table/flag invariant was violated after a trusted boundary (e.g. a
    /// wrap over foreign memory).
    Corrupt,
    /// Attempted to mutate a read-only view.
    ReadOnly,
    /// `getResult` on a virgin intersection, or any other call made before
    /// the object has reached the state it requires.
    IllegalState,
    /// The caller-supplied target memory is too small for the requested
    /// compact form.
    InsufficientCapacity,
    /// Logic bug guard: a correctly sized hash table should never fill up.
    HashTableFull,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::MalformedHeader => "MalformedHeader",
            ErrorKind::Corrupt => "Corrupt",
            ErrorKind::ReadOnly => "ReadOnly",
            ErrorKind::IllegalState => "IllegalState",
            ErrorKind::InsufficientCapacity => "InsufficientCapacity",
            ErrorKind::HashTableFull => "HashTableFull",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all theta-sketch functions.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),
            source: None,
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Panics
    ///
    /// Panics if the source has been set.
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

// Convenience constructors, one per common failure site in the spec.
impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, msg)
    }

    pub(crate) fn seed_mismatch(expected: u16, actual: u16) -> Self {
        Self::invalid_argument(format!(
            "seed hash mismatch: expected 0x{expected:04X}, got 0x{actual:04X}"
        ))
    }

    pub(crate) fn read_only(op: &'static str) -> Self {
        Self::new(ErrorKind::ReadOnly, format!("cannot {op} a read-only view"))
    }

    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalState, msg)
    }

    pub(crate) fn insufficient_capacity(needed: usize, available: usize) -> Self {
        Self::new(
            ErrorKind::InsufficientCapacity,
            format!("target memory too small: need {needed} bytes, have {available}"),
        )
    }

    pub(crate) fn hash_table_full() -> Self {
        Self::new(
            ErrorKind::HashTableFull,
            "probe sequence visited every slot without finding the key or an empty slot",
        )
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt, msg)
    }

    pub(crate) fn malformed_header(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedHeader, msg)
    }

    pub(crate) fn insufficient_data(msg: impl fmt::Display) -> Self {
        Self::malformed_header(format!("insufficient data: {msg}"))
    }

    pub(crate) fn invalid_family(expected: u8, actual: u8, name: &'static str) -> Self {
        Self::malformed_header(format!(
            "invalid family: expected {expected} ({name}), got {actual}"
        ))
    }

    pub(crate) fn unsupported_serial_version(actual: u8) -> Self {
        Self::malformed_header(format!("unsupported serial version: got {actual}"))
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "   {source:#}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}
