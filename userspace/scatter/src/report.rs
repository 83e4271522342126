// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Map report reader ("Image component sizes" object rows)
//!
//! OWNERS: @build-tools
//!
//! STATUS: Experimental
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE: Unit tests below
//!
//! INVARIANTS:
//! - Lines before the first `Image component sizes` marker are ignored
//! - A row is exactly six unsigned integers followed by `[A-Za-z0-9_-]+.o`
//! - Rows are returned in report order, duplicates included
//! - Non-UTF-8 bytes and `\r\n` endings never abort parsing

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::objects::ObjectRecord;
use crate::{Error, Result};

/// Heading that starts the per-object size table.
pub const SIZES_MARKER: &str = "Image component sizes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Searching,
    Collecting,
}

/// Line-at-a-time report scanner.
#[derive(Debug, Clone)]
pub struct ReportParser {
    state: ParseState,
}

impl Default for ReportParser {
    fn default() -> Self {
        Self { state: ParseState::Searching }
    }
}

impl ReportParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_seen(&self) -> bool {
        self.state == ParseState::Collecting
    }

    /// Consumes one line and returns the record it describes, if any.
    ///
    /// The marker line itself never yields a record.
    pub fn feed(&mut self, line: &str) -> Option<ObjectRecord> {
        match self.state {
            ParseState::Searching => {
                if line.contains(SIZES_MARKER) {
                    self.state = ParseState::Collecting;
                }
                None
            }
            ParseState::Collecting => parse_object_line(line),
        }
    }
}

/// Parses a single size row, e.g. `   1024   32   0   4   8   2048   main.o`.
pub fn parse_object_line(line: &str) -> Option<ObjectRecord> {
    let mut tokens = line.split_whitespace();
    let mut sizes = [0u64; 6];
    for slot in &mut sizes {
        let token = tokens.next()?;
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = token.parse().ok()?;
    }
    let name = tokens.next()?;
    if tokens.next().is_some() || !is_object_name(name) {
        return None;
    }
    let [code, inc_data, ro_data, rw_data, zi_data, debug] = sizes;
    Some(ObjectRecord::new(name, code, inc_data, ro_data, rw_data, zi_data, debug))
}

fn is_object_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".o") else {
        return false;
    };
    !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Reads every object row from `reader`.
pub fn read_report<R: BufRead>(mut reader: R) -> std::io::Result<Vec<ObjectRecord>> {
    let mut parser = ReportParser::new();
    let mut records = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if let Some(record) = parser.feed(line.trim_end_matches(['\r', '\n'])) {
            records.push(record);
        }
    }
    if !parser.marker_seen() {
        warn!("map report has no `{SIZES_MARKER}` section; no objects found");
    }
    Ok(records)
}

/// Opens and reads the map report at `path`.
pub fn load_report(path: &Path) -> Result<Vec<ObjectRecord>> {
    let unreadable = |source| Error::ReportUnreadable { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(unreadable)?;
    let records = read_report(BufReader::new(file)).map_err(unreadable)?;
    debug!("{}: {} object row(s)", path.display(), records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Component: ARM Compiler 5.06 update 6 (build 750) Tool: armlink [4d35ed]

    10   20   30   40   50   60   before_marker.o

==============================================================================

Image component sizes


      Code (inc. data)   RO Data    RW Data    ZI Data      Debug   Object Name

       100         12          4          8         16        320   startup_stm32.o\r
      2048         64          0          0          0       4096   main.o
        64          0          0          0          0         40   main.o
      1234          0          0          0          0          0   board-init.o
       100          0          0          0          0   dangling
       100          0          0          0          0          0   lib.a
    ----------------------------------------------------------------------
      3446         76        512         32       1056       4456   Object Totals
";

    #[test]
    fn collects_rows_after_marker_only() {
        let records = read_report(SAMPLE.as_bytes()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["startup_stm32.o", "main.o", "main.o", "board-init.o"]);
        let startup = &records[0];
        assert_eq!(
            (startup.code_size, startup.inc_data_size, startup.ro_data_size),
            (100, 12, 4)
        );
        assert_eq!(
            (startup.rw_data_size, startup.zi_data_size, startup.debug_size),
            (8, 16, 320)
        );
        assert_eq!(records[2].code_size, 64);
    }

    #[test]
    fn row_shape_is_strict() {
        assert!(parse_object_line("1 2 3 4 5 6 a.o").is_some());
        assert!(parse_object_line("\t1\t2\t3\t4\t5\t6\tfoo_bar-1.o").is_some());
        assert!(parse_object_line("1 2 3 4 5 a.o").is_none());
        assert!(parse_object_line("1 2 3 4 5 6 7 a.o").is_none());
        assert!(parse_object_line("1 2 3 4 5 -6 a.o").is_none());
        assert!(parse_object_line("1 2 3 4 5 6 dir/a.o").is_none());
        assert!(parse_object_line("1 2 3 4 5 6 .o").is_none());
        assert!(parse_object_line("1 2 3 4 5 6 a.o extra").is_none());
    }

    #[test]
    fn missing_marker_yields_nothing() {
        let records = read_report("   1 2 3 4 5 6 a.o\n".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn invalid_utf8_does_not_abort() {
        let mut bytes = b"Image component sizes\n".to_vec();
        bytes.extend_from_slice(b"  \xff\xfe junk\n  1 2 3 4 5 6 ok.o\n");
        let records = read_report(bytes.as_slice()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ok.o");
    }

    #[test]
    fn unreadable_path_is_reported() {
        let err = load_report(Path::new("/nonexistent/sctgen/app.map")).unwrap_err();
        assert!(matches!(err, Error::ReportUnreadable { .. }));
    }
}
