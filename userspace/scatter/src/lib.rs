//! CONTEXT: Scatter-load script generation from linker map reports
//! INTENT: Place every object of a map report into load/execution regions and render the scatter file
//! IDL (target): generate(config), plan(topology, reservations, objects)
//! DEPS: serde + toml (configuration), log (diagnostics), std::fs (report/script I/O)
//! READINESS: Library ready; used by `tools/sctgen`
//! TESTS: Placement scenarios; placement property tests; config + end-to-end generation
// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod emit;
pub mod objects;
pub mod placement;
pub mod reservation;
pub mod report;
pub mod topology;

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{info, warn};
use thiserror::Error;

pub use config::Config;
pub use emit::ScatterEmitter;
pub use objects::{ObjectDatabase, ObjectId, ObjectRecord, Section};
pub use placement::{
    Diagnostic, ExecPlacement, Layout, PlacedObject, PlacementEngine, PlacementReport,
    PlacementSink, PlacementState,
};
pub use reservation::ReservationTable;
pub use topology::{CapacityViolation, ExecRegion, LoadRegion, RegionSpec, RegionTopology};

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Unrecoverable setup and I/O failures. Placement problems are [`Diagnostic`]s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing configuration item `{0}`")]
    ConfigMissing(String),
    #[error("invalid size `{value}` for `{key}`")]
    InvalidSize { key: String, value: String },
    #[error("invalid configuration item `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("failed to read map report {path}: {source}")]
    ReportUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads every configured map report into one database, in configuration order.
pub fn load_objects(config: &Config) -> Result<ObjectDatabase> {
    let mut objects = ObjectDatabase::new();
    for path in &config.map_files {
        for record in report::load_report(path)? {
            objects.append(record);
        }
    }
    Ok(objects)
}

/// Places `objects` and renders the complete scatter script into memory.
pub fn render(
    config: &Config,
    objects: ObjectDatabase,
) -> io::Result<(Vec<u8>, PlacementReport)> {
    let mut state = PlacementState::new(objects);
    let engine = PlacementEngine::new(&config.topology, &config.reservations);
    let mut emitter = ScatterEmitter::new(Vec::new(), config.exec_region_prefix.as_str());
    emitter.write_preamble(config.preprocess.as_deref())?;
    let report = engine.run(&mut state, &mut emitter)?;
    Ok((emitter.into_inner(), report))
}

/// Runs the whole pipeline: read reports, place objects, write the script.
pub fn generate(config: &Config) -> Result<PlacementReport> {
    let objects = load_objects(config)?;
    write_script(config, objects)
}

/// Places `objects` and writes the script to `config.output` in one operation
/// once fully rendered.
pub fn write_script(config: &Config, objects: ObjectDatabase) -> Result<PlacementReport> {
    for violation in config.topology.capacity_violations() {
        warn!(
            "{}: execution regions declare {} bytes but the load region holds {}",
            emit::load_region_label(violation.load_index),
            violation.exec_total,
            violation.load_size
        );
    }
    info!("{} object(s) read from {} map report(s)", objects.len(), config.map_files.len());

    let write_err = |source| Error::Write { path: config.output.clone(), source };
    let (script, report) = render(config, objects).map_err(write_err)?;
    if let Some(parent) = config.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(&config.output, script).map_err(write_err)?;
    info!("wrote {}", config.output.display());
    Ok(report)
}
