//! Temporary working directories for end-to-end tests.
//!
//! Output images and the bounds file land next to the input GRIB2 file, so
//! every test gets its own directory that is removed on drop.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

use crate::grib2::{concat_messages, multi_field_message, Grib2Builder};

/// A scratch directory holding one GRIB2 input and its JSON config.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file relative to the workspace root.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write raw bytes as a file in the workspace.
    pub fn write_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, data).expect("write test file");
        path
    }

    /// Write the given messages, one band each, as a GRIB2 file.
    pub fn write_grib(&self, name: &str, messages: &[Grib2Builder]) -> PathBuf {
        self.write_file(name, &concat_messages(messages))
    }

    /// Write a JSON config document.
    pub fn write_config(&self, name: &str, config: &Value) -> PathBuf {
        let text = serde_json::to_string_pretty(config).expect("serialize config");
        self.write_file(name, text.as_bytes())
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> Vec<u8> {
        fs::read(self.join(relative)).expect("read output file")
    }

    pub fn read_to_string(&self, relative: impl AsRef<Path>) -> String {
        fs::read_to_string(self.join(relative)).expect("read output file")
    }

    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.join(relative).exists()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// A 2x2 surface pressure field with values 0, 10, 20, 30 (Pa).
pub fn pressure_2x2() -> Grib2Builder {
    Grib2Builder::new_gfs()
        .with_parameter(3, 0)
        .with_level(1, 0)
        .with_grid(2, 2)
        .with_data(vec![0.0, 10.0, 20.0, 30.0])
}

/// 10 m wind components as two constant bands (UGRD then VGRD).
pub fn wind_components(ni: u32, nj: u32, u: f32, v: f32) -> Vec<Grib2Builder> {
    let base = Grib2Builder::new_gfs().with_level(103, 10).with_grid(ni, nj);
    vec![
        base.clone().with_parameter(2, 2).with_constant_value(u),
        base.with_parameter(2, 3).with_constant_value(v),
    ]
}

/// The same wind components packed as two fields of a single message.
pub fn packed_wind_message(ni: u32, nj: u32, u: f32, v: f32) -> Vec<u8> {
    multi_field_message(&wind_components(ni, nj, u, v))
}

/// 2 m temperature gradient in Kelvin.
pub fn temperature(ni: u32, nj: u32, min_kelvin: f32, max_kelvin: f32) -> Grib2Builder {
    Grib2Builder::new_gfs()
        .with_grid(ni, nj)
        .with_gradient(min_kelvin, max_kelvin)
}
