// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Ordered object database built from map report size rows
//!
//! OWNERS: @build-tools
//!
//! STATUS: Experimental
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE: Unit tests below; placement invariants in `tests/placement_props.rs`
//!
//! INVARIANTS:
//! - Records keep report order; duplicates are never merged
//! - `live_count()` always equals the number of records with `used == false`

use std::fmt;
use std::io::{self, Write};

/// Output section selector for one object line in the scatter script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Code plus read-only data (`+RO`).
    Code,
    /// Initialized read-write data (`+RW`).
    Rw,
    /// Zero-initialized data (`+ZI`).
    Zi,
}

impl Section {
    /// Attribute selector as written in the scatter file.
    pub fn attr(self) -> &'static str {
        match self {
            Section::Code => "+RO",
            Section::Rw => "+RW",
            Section::Zi => "+ZI",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attr())
    }
}

/// Size breakdown of one compiled object as listed in the map report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub name: String,
    pub code_size: u64,
    pub inc_data_size: u64,
    pub ro_data_size: u64,
    pub rw_data_size: u64,
    pub zi_data_size: u64,
    pub debug_size: u64,
    used: bool,
}

impl ObjectRecord {
    pub fn new(
        name: impl Into<String>,
        code_size: u64,
        inc_data_size: u64,
        ro_data_size: u64,
        rw_data_size: u64,
        zi_data_size: u64,
        debug_size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            code_size,
            inc_data_size,
            ro_data_size,
            rw_data_size,
            zi_data_size,
            debug_size,
            used: false,
        }
    }

    /// Shorthand for records that only carry code.
    pub fn with_code(name: impl Into<String>, code_size: u64) -> Self {
        Self::new(name, code_size, 0, 0, 0, 0, 0)
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Capacity consumed in an execution region: code + RW + ZI.
    ///
    /// Inc-data, RO-data and debug sizes are informational only.
    pub fn footprint(&self) -> u64 {
        self.code_size.saturating_add(self.rw_data_size).saturating_add(self.zi_data_size)
    }

    /// Non-empty output sections in emission order (RO, RW, ZI).
    pub fn sections(&self) -> Vec<(Section, u64)> {
        [
            (Section::Code, self.code_size),
            (Section::Rw, self.rw_data_size),
            (Section::Zi, self.zi_data_size),
        ]
        .into_iter()
        .filter(|(_, size)| *size != 0)
        .collect()
    }
}

/// Stable handle to a record inside an [`ObjectDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectDatabase {
    records: Vec<ObjectRecord>,
    live: usize,
}

impl ObjectDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` at the end and returns its handle.
    ///
    /// A record that arrives already marked used does not count as live.
    pub fn append(&mut self, record: ObjectRecord) -> ObjectId {
        if !record.used {
            self.live += 1;
        }
        self.records.push(record);
        ObjectId(self.records.len() - 1)
    }

    pub fn get(&self, id: ObjectId) -> &ObjectRecord {
        &self.records[id.0]
    }

    /// First unused record whose name starts with `prefix`, scanning from the start.
    pub fn find_unused_by_prefix(&self, prefix: &str) -> Option<ObjectId> {
        self.records
            .iter()
            .position(|record| !record.used && record.name.starts_with(prefix))
            .map(ObjectId)
    }

    /// Whether any record, used or not, starts with `prefix`.
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.records.iter().any(|record| record.name.starts_with(prefix))
    }

    /// Marks `id` as placed. Committing the same record twice is a caller bug.
    pub fn commit(&mut self, id: ObjectId) {
        let record = &mut self.records[id.0];
        debug_assert!(!record.used, "object `{}` committed twice", record.name);
        record.used = true;
        self.live -= 1;
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clears every `used` flag so the same inputs can be placed again.
    pub fn reset(&mut self) {
        for record in &mut self.records {
            record.used = false;
        }
        self.live = self.records.len();
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectRecord)> {
        self.records.iter().enumerate().map(|(idx, record)| (ObjectId(idx), record))
    }

    pub fn unused(&self) -> impl Iterator<Item = (ObjectId, &ObjectRecord)> {
        self.iter().filter(|(_, record)| !record.used)
    }

    /// Writes the tab-separated size listing, one record per line.
    pub fn write_dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for record in &self.records {
            writeln!(
                out,
                "\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                record.code_size,
                record.inc_data_size,
                record.ro_data_size,
                record.rw_data_size,
                record.zi_data_size,
                record.debug_size,
                record.name
            )?;
        }
        Ok(())
    }
}

impl FromIterator<ObjectRecord> for ObjectDatabase {
    fn from_iter<I: IntoIterator<Item = ObjectRecord>>(iter: I) -> Self {
        let mut db = ObjectDatabase::new();
        for record in iter {
            db.append(record);
        }
        db
    }
}
