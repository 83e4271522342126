// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Region placement engine (reserved placement + greedy first-fit free fill)
//!
//! OWNERS: @build-tools
//!
//! STATUS: Experimental
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE:
//!   - Unit tests below (phase 1/phase 2 edge cases)
//!   - `tests/placement_scenarios.rs` (end-to-end layouts)
//!   - `tests/placement_props.rs` (property tests for placement invariants)
//!
//! INVARIANTS:
//! - Load regions, then execution regions, are visited in declaration order
//! - An object is committed at most once across the whole topology
//! - Committed footprints never exceed an execution region's capacity
//! - An object matching any reservation is never taken by free fill
//! - Free fill is strict first fit in report order: the first candidate that
//!   does not fit ends the fill for that execution region
//! - Phase 1 keeps scanning after an unmatched reservation but stops at the
//!   first reserved object that does not fit; either marks the region
//!   overflowed and suppresses free fill
//! - Objects with no code, RW or ZI bytes still count as placed; they take no
//!   capacity and render no section line

use std::convert::Infallible;
use std::fmt;

use log::{debug, info, warn};

use crate::objects::{ObjectDatabase, ObjectId, Section};
use crate::reservation::ReservationTable;
use crate::topology::{ExecRegion, LoadRegion, RegionTopology};

/// One object committed to an execution region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub name: String,
    /// Non-empty sections in emission order.
    pub sections: Vec<(Section, u64)>,
    pub footprint: u64,
    /// Placed through a reservation rather than free fill.
    pub reserved: bool,
}

/// Resolved contents of one execution region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecPlacement {
    pub load_index: usize,
    pub exec_index: usize,
    pub objects: Vec<PlacedObject>,
    pub remaining: u64,
    pub overflowed: bool,
}

impl ExecPlacement {
    pub fn used(&self) -> u64 {
        self.objects.iter().map(|object| object.footprint).sum()
    }
}

/// Recoverable conditions raised while placing objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A reservation prefix matches no object in the report.
    ReservationUnmatched { load_index: usize, exec_index: usize, prefix: String },
    /// A reserved object does not fit the execution region being filled.
    ReservedCapacityExceeded {
        load_index: usize,
        exec_index: usize,
        object: String,
        footprint: u64,
        remaining: u64,
    },
    /// The next free-fill candidate does not fit; free fill stops for this region.
    FreeCapacityExceeded {
        load_index: usize,
        exec_index: usize,
        object: String,
        footprint: u64,
        remaining: u64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ReservationUnmatched { load_index, exec_index, prefix } => write!(
                f,
                "IROM{load_index}_{exec_index}: reservation `{prefix}` has no matching object"
            ),
            Diagnostic::ReservedCapacityExceeded {
                load_index,
                exec_index,
                object,
                footprint,
                remaining,
            } => write!(
                f,
                "IROM{load_index}_{exec_index}: insufficient space for reserved object `{object}` \
                 (needs {footprint}, remain {remaining})"
            ),
            Diagnostic::FreeCapacityExceeded {
                load_index,
                exec_index,
                object,
                footprint,
                remaining,
            } => write!(
                f,
                "IROM{load_index}_{exec_index}: object `{object}` does not fit \
                 (needs {footprint}, remain {remaining})"
            ),
        }
    }
}

/// Outcome of a full topology walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub diagnostics: Vec<Diagnostic>,
    pub placed: usize,
    /// Names of objects left unused, in report order.
    pub unplaced: Vec<String>,
    /// `(load_index, exec_index)` of every overflowed execution region.
    pub overflowed: Vec<(usize, usize)>,
}

impl PlacementReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.unplaced.is_empty()
    }
}

/// Receives execution regions as soon as they are resolved.
pub trait PlacementSink {
    type Error;

    fn begin_load_region(&mut self, region: &LoadRegion) -> Result<(), Self::Error>;

    fn exec_region(
        &mut self,
        region: &ExecRegion,
        placement: &ExecPlacement,
    ) -> Result<(), Self::Error>;

    fn end_load_region(&mut self, region: &LoadRegion) -> Result<(), Self::Error>;
}

/// Mutable run state: the object database plus per-execution-region capacity.
#[derive(Debug, Clone)]
pub struct PlacementState {
    objects: ObjectDatabase,
    remaining: Vec<Vec<u64>>,
}

impl PlacementState {
    pub fn new(objects: ObjectDatabase) -> Self {
        Self { objects, remaining: Vec::new() }
    }

    pub fn objects(&self) -> &ObjectDatabase {
        &self.objects
    }

    /// Remaining capacity of an execution region after the last run (1-based indices).
    pub fn remaining(&self, load_index: usize, exec_index: usize) -> Option<u64> {
        self.remaining.get(load_index.checked_sub(1)?)?.get(exec_index.checked_sub(1)?).copied()
    }

    /// Forgets every placement so the same inputs can be run again.
    pub fn reset(&mut self) {
        self.objects.reset();
        self.remaining.clear();
    }

    fn commit(&mut self, id: ObjectId, reserved: bool) -> PlacedObject {
        self.objects.commit(id);
        let record = self.objects.get(id);
        let sections = record.sections();
        if sections.is_empty() {
            debug!("{} has no code, RW or ZI bytes; placed without a section line", record.name);
        }
        PlacedObject {
            id,
            name: record.name.clone(),
            sections,
            footprint: record.footprint(),
            reserved,
        }
    }
}

/// Collects the whole layout in memory; used by tests and dry runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub exec_regions: Vec<ExecPlacement>,
}

impl Layout {
    pub fn region(&self, load_index: usize, exec_index: usize) -> Option<&ExecPlacement> {
        self.exec_regions
            .iter()
            .find(|exec| exec.load_index == load_index && exec.exec_index == exec_index)
    }

    /// Object names of one execution region in placement order.
    pub fn names(&self, load_index: usize, exec_index: usize) -> Vec<&str> {
        self.region(load_index, exec_index)
            .map(|exec| exec.objects.iter().map(|object| object.name.as_str()).collect())
            .unwrap_or_default()
    }
}

impl PlacementSink for Layout {
    type Error = Infallible;

    fn begin_load_region(&mut self, _region: &LoadRegion) -> Result<(), Infallible> {
        Ok(())
    }

    fn exec_region(
        &mut self,
        _region: &ExecRegion,
        placement: &ExecPlacement,
    ) -> Result<(), Infallible> {
        self.exec_regions.push(placement.clone());
        Ok(())
    }

    fn end_load_region(&mut self, _region: &LoadRegion) -> Result<(), Infallible> {
        Ok(())
    }
}

pub struct PlacementEngine<'a> {
    topology: &'a RegionTopology,
    reservations: &'a ReservationTable,
}

impl<'a> PlacementEngine<'a> {
    pub fn new(topology: &'a RegionTopology, reservations: &'a ReservationTable) -> Self {
        Self { topology, reservations }
    }

    /// Walks the topology, streaming every resolved execution region into `sink`.
    pub fn run<S: PlacementSink>(
        &self,
        state: &mut PlacementState,
        sink: &mut S,
    ) -> Result<PlacementReport, S::Error> {
        let mut report = PlacementReport::default();
        state.remaining = self
            .topology
            .load_regions()
            .iter()
            .map(|load| load.exec_regions().iter().map(|exec| exec.spec.size).collect())
            .collect();

        for load in self.topology.load_regions() {
            sink.begin_load_region(load)?;
            for exec in load.exec_regions() {
                let placement = self.fill_exec_region(state, load, exec, &mut report.diagnostics);
                state.remaining[load.index - 1][exec.index - 1] = placement.remaining;
                report.placed += placement.objects.len();
                if placement.overflowed {
                    report.overflowed.push((load.index, exec.index));
                }
                sink.exec_region(exec, &placement)?;
            }
            sink.end_load_region(load)?;
        }

        report.unplaced =
            state.objects.unused().map(|(_, record)| record.name.clone()).collect();
        if !report.unplaced.is_empty() {
            warn!(
                "{} object(s) left unplaced: {}",
                report.unplaced.len(),
                report.unplaced.join(", ")
            );
        }
        info!(
            "placed {} object(s) into {} execution region(s), {} diagnostic(s)",
            report.placed,
            self.topology.exec_region_count(),
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// Runs into an in-memory [`Layout`].
    pub fn plan(&self, state: &mut PlacementState) -> (Layout, PlacementReport) {
        let mut layout = Layout::default();
        let report = match self.run(state, &mut layout) {
            Ok(report) => report,
            Err(never) => match never {},
        };
        (layout, report)
    }

    fn fill_exec_region(
        &self,
        state: &mut PlacementState,
        load: &LoadRegion,
        exec: &ExecRegion,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ExecPlacement {
        let mut placement = ExecPlacement {
            load_index: load.index,
            exec_index: exec.index,
            objects: Vec::new(),
            remaining: exec.spec.size,
            overflowed: false,
        };

        placement.overflowed = self.place_reserved(state, &mut placement, diagnostics);
        if !placement.overflowed {
            placement.overflowed = self.free_fill(state, &mut placement, diagnostics);
        }

        debug!(
            "IROM{}_{}: {} object(s), remain {}{}",
            load.index,
            exec.index,
            placement.objects.len(),
            placement.remaining,
            if placement.overflowed { " (overflowed)" } else { "" }
        );
        placement
    }

    /// Phase 1. Returns whether the region overflowed.
    fn place_reserved(
        &self,
        state: &mut PlacementState,
        placement: &mut ExecPlacement,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        let mut overflowed = false;
        for prefix in self.reservations.reservations_for(placement.load_index) {
            let Some(id) = state.objects.find_unused_by_prefix(prefix) else {
                if !state.objects.contains_prefix(prefix) {
                    report(
                        diagnostics,
                        Diagnostic::ReservationUnmatched {
                            load_index: placement.load_index,
                            exec_index: placement.exec_index,
                            prefix: prefix.clone(),
                        },
                    );
                    overflowed = true;
                }
                continue;
            };

            let footprint = state.objects.get(id).footprint();
            if footprint > placement.remaining {
                report(
                    diagnostics,
                    Diagnostic::ReservedCapacityExceeded {
                        load_index: placement.load_index,
                        exec_index: placement.exec_index,
                        object: state.objects.get(id).name.clone(),
                        footprint,
                        remaining: placement.remaining,
                    },
                );
                return true;
            }

            let placed = state.commit(id, true);
            debug!(
                "IROM{}_{}: reserved {} ({footprint})",
                placement.load_index, placement.exec_index, placed.name
            );
            placement.remaining -= footprint;
            placement.objects.push(placed);
        }
        overflowed
    }

    /// Phase 2. Returns whether the region overflowed.
    fn free_fill(
        &self,
        state: &mut PlacementState,
        placement: &mut ExecPlacement,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        while placement.remaining > 0 && state.objects.live_count() > 0 {
            let candidate = state
                .objects
                .unused()
                .find(|(_, record)| !self.reservations.is_reserved(&record.name))
                .map(|(id, record)| (id, record.footprint()));
            let Some((id, footprint)) = candidate else {
                break;
            };

            if footprint > placement.remaining {
                report(
                    diagnostics,
                    Diagnostic::FreeCapacityExceeded {
                        load_index: placement.load_index,
                        exec_index: placement.exec_index,
                        object: state.objects.get(id).name.clone(),
                        footprint,
                        remaining: placement.remaining,
                    },
                );
                return true;
            }

            let placed = state.commit(id, false);
            debug!(
                "IROM{}_{}: placed {} ({footprint})",
                placement.load_index, placement.exec_index, placed.name
            );
            placement.remaining -= footprint;
            placement.objects.push(placed);
        }
        false
    }
}

fn report(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    warn!("{diagnostic}");
    diagnostics.push(diagnostic);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectRecord;
    use crate::topology::RegionSpec;

    fn topology(exec_sizes: &[&[u64]]) -> RegionTopology {
        let mut topology = RegionTopology::new();
        for (idx, sizes) in exec_sizes.iter().enumerate() {
            let base = format!("0x{:08X}", idx * 0x1000_0000);
            let specs = sizes.iter().map(|size| RegionSpec::new(base.clone(), *size)).collect();
            topology.push_load_region(RegionSpec::new(base, sizes.iter().sum()), specs);
        }
        topology
    }

    fn state(records: Vec<ObjectRecord>) -> PlacementState {
        PlacementState::new(records.into_iter().collect())
    }

    #[test]
    fn unmatched_reservation_keeps_scanning_but_blocks_free_fill() {
        let topo = topology(&[&[100]]);
        let mut reservations = ReservationTable::new();
        reservations.reserve(1, "startup");
        reservations.reserve(1, "system_");
        let mut st = state(vec![
            ObjectRecord::with_code("main.o", 10),
            ObjectRecord::with_code("system_stm32.o", 20),
        ]);

        let (layout, report) = PlacementEngine::new(&topo, &reservations).plan(&mut st);

        assert_eq!(layout.names(1, 1), vec!["system_stm32.o"]);
        assert_eq!(report.unplaced, vec!["main.o".to_string()]);
        assert!(matches!(
            report.diagnostics.as_slice(),
            [Diagnostic::ReservationUnmatched { prefix, .. }] if prefix == "startup"
        ));
        assert_eq!(report.overflowed, vec![(1, 1)]);
    }

    #[test]
    fn reserved_capacity_failure_stops_phase_one() {
        let topo = topology(&[&[50]]);
        let mut reservations = ReservationTable::new();
        reservations.reserve(1, "big");
        reservations.reserve(1, "small");
        let mut st = state(vec![
            ObjectRecord::with_code("big_table.o", 60),
            ObjectRecord::with_code("small.o", 5),
        ]);

        let (layout, report) = PlacementEngine::new(&topo, &reservations).plan(&mut st);

        assert!(layout.names(1, 1).is_empty());
        assert_eq!(report.diagnostics.len(), 1);
        assert!(matches!(
            &report.diagnostics[0],
            Diagnostic::ReservedCapacityExceeded { object, footprint: 60, remaining: 50, .. }
                if object == "big_table.o"
        ));
        assert_eq!(report.unplaced.len(), 2);
    }

    #[test]
    fn already_placed_reservation_is_skipped_in_later_regions() {
        let topo = topology(&[&[30, 30]]);
        let mut reservations = ReservationTable::new();
        reservations.reserve(1, "boot");
        let mut st = state(vec![
            ObjectRecord::with_code("boot.o", 10),
            ObjectRecord::with_code("a.o", 20),
            ObjectRecord::with_code("b.o", 25),
        ]);

        let (layout, report) = PlacementEngine::new(&topo, &reservations).plan(&mut st);

        assert_eq!(layout.names(1, 1), vec!["boot.o", "a.o"]);
        assert_eq!(layout.names(1, 2), vec!["b.o"]);
        assert!(report.is_clean());
        assert_eq!(st.remaining(1, 2), Some(5));
    }

    #[test]
    fn reserved_objects_are_not_stolen_by_earlier_load_regions() {
        let topo = topology(&[&[100], &[100]]);
        let mut reservations = ReservationTable::new();
        reservations.reserve(2, "ramfunc");
        let mut st = state(vec![
            ObjectRecord::with_code("ramfunc_flash.o", 10),
            ObjectRecord::with_code("main.o", 10),
        ]);

        let (layout, report) = PlacementEngine::new(&topo, &reservations).plan(&mut st);

        assert_eq!(layout.names(1, 1), vec!["main.o"]);
        assert_eq!(layout.names(2, 1), vec!["ramfunc_flash.o"]);
        assert!(report.is_clean());
    }

    #[test]
    fn zero_capacity_region_skips_free_fill() {
        let topo = topology(&[&[0, 10]]);
        let reservations = ReservationTable::new();
        let mut st = state(vec![ObjectRecord::with_code("a.o", 10)]);

        let (layout, report) = PlacementEngine::new(&topo, &reservations).plan(&mut st);

        assert!(layout.names(1, 1).is_empty());
        assert_eq!(layout.names(1, 2), vec!["a.o"]);
        assert!(report.overflowed.is_empty());
    }

    #[test]
    fn sections_follow_non_zero_sizes() {
        let topo = topology(&[&[1000]]);
        let reservations = ReservationTable::new();
        let mut st = state(vec![ObjectRecord::new("uart.o", 100, 3, 4, 8, 16, 900)]);

        let (layout, _) = PlacementEngine::new(&topo, &reservations).plan(&mut st);

        let region = layout.region(1, 1).unwrap();
        assert_eq!(region.remaining, 1000 - 124);
        assert_eq!(
            region.objects[0].sections,
            vec![(Section::Code, 100), (Section::Rw, 8), (Section::Zi, 16)]
        );
    }
}
