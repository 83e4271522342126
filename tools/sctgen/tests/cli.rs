// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: sctgen command-line tests
//! OWNERS: @build-tools
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 6 CLI tests
//!
//! TEST_SCENARIOS:
//!   - writes_configured_output(): default run writes `file.out_sct_file`
//!   - output_flag_overrides_config(): `-o` replaces the configured path
//!   - dump_objects_lists_report_rows(): `--dump-objects` debug listing
//!   - strict_mode_fails_on_unplaced_objects(): exit status with `--strict`
//!   - strict_mode_rejects_oversubscribed_load_region(): fatal before placement
//!   - missing_config_item_fails(): ConfigMissing exits non-zero

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const MAP: &str = "\
Image component sizes

      Code (inc. data)   RO Data    RW Data    ZI Data      Debug   Object Name

       100          0          0          0          0          0   startup_a.o
       300          0          0          0          0          0   big.o
";

fn config(region_size: u32) -> String {
    format!(
        r#"
[file]
map_file = "app.map"
out_sct_file = "app.sct"

[rom]
exec_region_prefix = "FW"

[[rom.load_region]]
address = "0x00000000"
size = {region_size}
exec_address = "0x00000000"
default_objects = ["startup_"]
"#
    )
}

fn setup(region_size: u32) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("app.map"), MAP).unwrap();
    fs::write(temp.path().join("sctgen.toml"), config(region_size)).unwrap();
    temp
}

fn sctgen(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sctgen"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn writes_configured_output() {
    let temp = setup(1024);
    let output = sctgen(temp.path(), &["sctgen.toml"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let script = fs::read_to_string(temp.path().join("app.sct")).unwrap();
    assert!(script.contains("Exec_Region_FW_IROM1_1 0x00000000 0x00000400 {"));
    assert!(script.contains("        startup_a.o (+RO) ; size=100\n        big.o (+RO) ; size=300\n"));
    assert!(script.contains("} ; remain 624\n"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("2 placed, 0 unplaced"));
}

#[test]
fn output_flag_overrides_config() {
    let temp = setup(1024);
    let output = sctgen(temp.path(), &["sctgen.toml", "-o", "custom.sct"]);
    assert!(output.status.success());
    assert!(temp.path().join("custom.sct").exists());
    assert!(!temp.path().join("app.sct").exists());
}

#[test]
fn dump_objects_lists_report_rows() {
    let temp = setup(1024);
    let output = sctgen(temp.path(), &["sctgen.toml", "--dump-objects", "objects.txt"]);
    assert!(output.status.success());
    let dump = fs::read_to_string(temp.path().join("objects.txt")).unwrap();
    assert_eq!(dump, "\t100\t0\t0\t0\t0\t0\tstartup_a.o\n\t300\t0\t0\t0\t0\t0\tbig.o\n");
}

#[test]
fn strict_mode_fails_on_unplaced_objects() {
    let temp = setup(200);
    let lenient = sctgen(temp.path(), &["sctgen.toml"]);
    assert!(lenient.status.success());
    assert!(temp.path().join("app.sct").exists());

    let strict = sctgen(temp.path(), &["sctgen.toml", "--strict"]);
    assert!(!strict.status.success());
    assert!(String::from_utf8_lossy(&strict.stderr).contains("unplaced objects: big.o"));
}

#[test]
fn strict_mode_rejects_oversubscribed_load_region() {
    let temp = setup(1024);
    fs::write(
        temp.path().join("sctgen.toml"),
        r#"
[file]
map_file = "app.map"
out_sct_file = "app.sct"

[rom]
exec_region_prefix = "FW"

[[rom.load_region]]
address = "0x00000000"
size = 100

[[rom.load_region.exec_region]]
address = "0x00000000"
size = 80

[[rom.load_region.exec_region]]
address = "0x00000050"
size = 80
"#,
    )
    .unwrap();

    let strict = sctgen(temp.path(), &["sctgen.toml", "--strict"]);
    assert!(!strict.status.success());
    assert!(String::from_utf8_lossy(&strict.stderr).contains(
        "Load_Region_IROM1: execution regions declare 160 bytes but the load region holds 100"
    ));
    assert!(!temp.path().join("app.sct").exists());

    let lenient = sctgen(temp.path(), &["sctgen.toml"]);
    assert!(lenient.status.success(), "{}", String::from_utf8_lossy(&lenient.stderr));
    assert!(temp.path().join("app.sct").exists());
}

#[test]
fn missing_config_item_fails() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("sctgen.toml"), "[file]\nout_sct_file = \"a.sct\"\n").unwrap();
    let output = sctgen(temp.path(), &["sctgen.toml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("file.map_file"));

    let output = sctgen(temp.path(), &[]);
    assert!(!output.status.success());
}
