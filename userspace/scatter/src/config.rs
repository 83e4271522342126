// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: sctgen TOML configuration (files, region topology, default objects)
//!
//! OWNERS: @build-tools
//!
//! STATUS: Experimental
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE: Unit tests below; file-based loading in `tests/generate.rs`
//!
//! The document is deserialized with every key optional and then resolved by
//! hand, so an absent key is reported by its dotted path instead of as a
//! generic TOML error.
//!
//! ```toml
//! [file]
//! map_file = "build/app.map"        # or ["a.map", "b.map"]
//! out_sct_file = "build/app.sct"
//! preprocess = "armcc -E -I ..\\src"
//!
//! [rom]
//! exec_region_prefix = "APP"
//!
//! [[rom.load_region]]
//! address = "0x00000000"
//! size = "0x40000"
//! default_objects = ["startup_", "system_"]
//!
//! [[rom.load_region.exec_region]]
//! address = "0x00000000"
//! size = 0x20000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::reservation::ReservationTable;
use crate::topology::{RegionSpec, RegionTopology};
use crate::{Error, Result};

/// Fully resolved generator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Map reports, read in order; their objects are concatenated.
    pub map_files: Vec<PathBuf>,
    pub output: PathBuf,
    /// Preprocessor command written as `#! <cmd>` on the first script line.
    pub preprocess: Option<String>,
    pub exec_region_prefix: String,
    pub topology: RegionTopology,
    pub reservations: ReservationTable,
}

impl Config {
    /// Reads `path`; relative file paths inside resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|source| Error::ConfigRead { path: path.to_path_buf(), source })?;
        let raw: RawConfig = toml::from_str(&data)
            .map_err(|source| Error::ConfigParse { path: path.to_path_buf(), source })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        raw.resolve(base_dir)
    }

    /// Parses a configuration held in memory.
    pub fn parse_str(input: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(input)
            .map_err(|source| Error::ConfigParse { path: PathBuf::from("<memory>"), source })?;
        raw.resolve(base_dir)
    }
}

/// Parses decimal or `0x`-prefixed hexadecimal size text.
pub fn parse_size(key: &str, text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| Error::InvalidSize { key: key.to_string(), value: text.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    file: Option<RawFile>,
    rom: Option<RawRom>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    map_file: Option<OneOrMany>,
    out_sct_file: Option<String>,
    preprocess: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
struct RawRom {
    exec_region_prefix: Option<String>,
    #[serde(default)]
    load_region: Vec<RawLoadRegion>,
}

#[derive(Debug, Deserialize)]
struct RawLoadRegion {
    address: Option<RawValue>,
    size: Option<RawValue>,
    exec_address: Option<RawValue>,
    #[serde(default)]
    exec_region: Vec<RawExecRegion>,
    #[serde(default)]
    default_objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawExecRegion {
    address: Option<RawValue>,
    size: Option<RawValue>,
}

/// Integer or text; TOML allows both `size = 0x400` and `size = "0x400"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Int(u64),
    Text(String),
}

impl RawValue {
    fn address(&self) -> String {
        match self {
            RawValue::Int(value) => format!("0x{value:08X}"),
            RawValue::Text(text) => text.trim().to_string(),
        }
    }

    fn size(&self, key: &str) -> Result<u64> {
        match self {
            RawValue::Int(value) => Ok(*value),
            RawValue::Text(text) => parse_size(key, text),
        }
    }
}

impl RawConfig {
    fn resolve(self, base_dir: &Path) -> Result<Config> {
        let file = self.file.ok_or_else(|| missing("file"))?;
        let map_files = match file.map_file.ok_or_else(|| missing("file.map_file"))? {
            OneOrMany::One(path) => vec![path],
            OneOrMany::Many(paths) => paths,
        };
        if map_files.is_empty() {
            return Err(missing("file.map_file"));
        }
        let map_files = map_files.iter().map(|path| resolve_path(base_dir, path)).collect();
        let output = resolve_path(
            base_dir,
            &file.out_sct_file.ok_or_else(|| missing("file.out_sct_file"))?,
        );
        let preprocess =
            file.preprocess.map(|cmd| cmd.trim().to_string()).filter(|cmd| !cmd.is_empty());

        let rom = self.rom.ok_or_else(|| missing("rom"))?;
        let exec_region_prefix =
            rom.exec_region_prefix.ok_or_else(|| missing("rom.exec_region_prefix"))?;
        if rom.load_region.is_empty() {
            return Err(missing("rom.load_region"));
        }

        let mut topology = RegionTopology::new();
        let mut reservations = ReservationTable::new();
        for (idx, raw) in rom.load_region.into_iter().enumerate() {
            let key = format!("rom.load_region[{}]", idx + 1);
            let address =
                raw.address.as_ref().ok_or_else(|| missing(&format!("{key}.address")))?.address();
            let size_key = format!("{key}.size");
            let size = raw.size.as_ref().ok_or_else(|| missing(&size_key))?.size(&size_key)?;

            let exec_specs = if raw.exec_region.is_empty() {
                // Legacy shorthand: one execution region spanning the load region.
                let exec_address = raw
                    .exec_address
                    .as_ref()
                    .ok_or_else(|| missing(&format!("{key}.exec_region")))?
                    .address();
                vec![RegionSpec::new(exec_address, size)]
            } else {
                raw.exec_region
                    .iter()
                    .enumerate()
                    .map(|(exec_idx, exec)| -> Result<RegionSpec> {
                        let exec_key = format!("{key}.exec_region[{}]", exec_idx + 1);
                        let address = exec
                            .address
                            .as_ref()
                            .ok_or_else(|| missing(&format!("{exec_key}.address")))?
                            .address();
                        let size_key = format!("{exec_key}.size");
                        let size =
                            exec.size.as_ref().ok_or_else(|| missing(&size_key))?.size(&size_key)?;
                        Ok(RegionSpec::new(address, size))
                    })
                    .collect::<Result<Vec<_>>>()?
            };

            let load_index = topology.push_load_region(RegionSpec::new(address, size), exec_specs);
            for prefix in raw.default_objects {
                let prefix = prefix.trim();
                if prefix.is_empty() {
                    return Err(Error::InvalidValue {
                        key: format!("{key}.default_objects"),
                        reason: "entries must not be empty".into(),
                    });
                }
                reservations.reserve(load_index, prefix);
            }
        }

        Ok(Config { map_files, output, preprocess, exec_region_prefix, topology, reservations })
    }
}

fn missing(key: &str) -> Error {
    Error::ConfigMissing(key.to_string())
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
