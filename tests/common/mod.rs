//! Shared test infrastructure for zone generation integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use gate_zones::reload::ReloadTrigger;
use gate_zones::{
    OutputLayout, ResolvedAddresses, Serial, WatchdogError, ZoneSetGenerator, ZoneSetSpec,
};

// --- Constants ---

pub const REDIRECT_V4: &str = "10.0.0.53";
pub const REDIRECT_V6: &str = "fd00::53";

// --- CountingReload ---

/// Reload trigger that counts invocations and can be told to fail.
#[derive(Clone, Default)]
pub struct CountingReload {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReloadTrigger for CountingReload {
    fn reload(&self) -> Result<(), WatchdogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(WatchdogError::ReloadTrigger("simulated failure".into()))
        } else {
            Ok(())
        }
    }
}

// --- Fixtures ---

pub fn test_addresses() -> ResolvedAddresses {
    ResolvedAddresses {
        ipv4: "192.168.1.10".to_string(),
        ipv6: "fd00::10".to_string(),
        redirect_ipv4: REDIRECT_V4.to_string(),
        redirect_ipv6: REDIRECT_V6.to_string(),
    }
}

pub fn test_serial() -> Serial {
    Serial::from_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
}

/// A temporary working directory with the standard file layout.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn zones_file(&self) -> PathBuf {
        self.dir.path().join("zones.json")
    }

    pub fn zone_dir(&self) -> PathBuf {
        self.dir.path().join("zones")
    }

    pub fn conf_file(&self) -> PathBuf {
        self.dir.path().join("named.conf.local")
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(self.zone_dir(), self.conf_file())
    }

    pub fn generator(&self) -> ZoneSetGenerator {
        ZoneSetGenerator::new(self.layout(), test_addresses())
    }

    pub fn write_spec(&self, json: &str) {
        fs::write(self.zones_file(), json).expect("failed to write zones.json");
    }

    pub fn read_zone(&self, file_name: &str) -> String {
        read(&self.zone_dir().join(file_name))
    }

    pub fn read_conf(&self) -> String {
        read(&self.conf_file())
    }

    /// Sorted file names in the zone directory.
    pub fn zone_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.zone_dir())
            .expect("zone dir missing")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

pub fn spec(json: &str) -> ZoneSetSpec {
    ZoneSetSpec::from_json(json).expect("invalid test spec")
}

// --- Zone content helpers ---

/// Lines of a zone file's A or AAAA section.
pub fn section<'a>(zone: &'a str, header: &str) -> Vec<&'a str> {
    zone.lines()
        .skip_while(|l| *l != header)
        .skip(1)
        .take_while(|l| !l.is_empty() && !l.starts_with(";;"))
        .collect()
}

pub fn a_records(zone: &str) -> Vec<&str> {
    section(zone, ";; A Records")
}

pub fn aaaa_records(zone: &str) -> Vec<&str> {
    section(zone, ";; AAAA Records")
}
