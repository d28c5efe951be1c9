//! Full regeneration of the zone directory and master registration file.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::address::ResolvedAddresses;
use crate::config::PathsConfig;
use crate::error::WatchdogError;
use crate::metrics;
use crate::spec::{self, ZoneSetSpec};
use crate::zone::{Serial, ZoneSynthesizer, BLOCKED_FILE, GATE_ZONE};

/// Output locations for one zone set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    zone_dir: PathBuf,
    conf_file: PathBuf,
    registered_dir: PathBuf,
}

impl OutputLayout {
    /// Layout writing zones into `zone_dir` and registering them from the
    /// same directory.
    pub fn new(zone_dir: impl Into<PathBuf>, conf_file: impl Into<PathBuf>) -> Self {
        let zone_dir = zone_dir.into();
        Self {
            registered_dir: zone_dir.clone(),
            zone_dir,
            conf_file: conf_file.into(),
        }
    }

    /// Reference zone files under `dir` in the master file.
    pub fn with_registered_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.registered_dir = dir.into();
        self
    }

    /// Directory receiving zone files.
    pub fn zone_dir(&self) -> &Path {
        &self.zone_dir
    }

    /// Master registration file.
    pub fn conf_file(&self) -> &Path {
        &self.conf_file
    }

    fn registered_path(&self, file_name: &str) -> PathBuf {
        self.registered_dir.join(file_name)
    }
}

impl From<&PathsConfig> for OutputLayout {
    fn from(paths: &PathsConfig) -> Self {
        OutputLayout::new(&paths.zone_dir, &paths.conf_file)
            .with_registered_dir(paths.registered_dir())
    }
}

/// Summary of a regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// `db.<root>` files written for non-blocked roots.
    pub zones_written: usize,
    /// Roots registered against the sinkhole zone.
    pub blocked_roots: usize,
    /// A records across all root zones.
    pub a_records: usize,
    /// AAAA records across all root zones.
    pub aaaa_records: usize,
}

/// Everything a regeneration writes, rendered in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedZoneSet {
    /// `(file name, content)` for every non-blocked root, in document order.
    pub zones: Vec<(String, String)>,
    /// Content of `db.blocked`.
    pub blocked: String,
    /// Content of `db.the.gate`.
    pub gate: String,
    /// Master registration stanzas, one per root domain.
    pub registrations: String,
    /// Stanza appended for the bootstrap zone.
    pub gate_registration: String,
    /// Counts for logging and metrics.
    pub report: GenerationReport,
}

fn zone_file_name(root: &str) -> String {
    format!("db.{root}")
}

fn stanza(name: &str, file: &Path) -> String {
    format!(
        "zone \"{name}\" {{\n    type master;\n    file \"{}\";\n}};\n",
        file.display()
    )
}

/// Regenerates the zone directory and master file. Sole writer of both.
#[derive(Debug, Clone)]
pub struct ZoneSetGenerator {
    layout: OutputLayout,
    addresses: ResolvedAddresses,
}

impl ZoneSetGenerator {
    /// Create a generator for `layout` using already-resolved addresses.
    pub fn new(layout: OutputLayout, addresses: ResolvedAddresses) -> Self {
        Self { layout, addresses }
    }

    /// Output layout.
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Addresses used for `{{SELF}}` and the gate zone.
    pub fn addresses(&self) -> &ResolvedAddresses {
        &self.addresses
    }

    /// Render the whole zone set without touching the filesystem.
    pub fn render(&self, spec: &ZoneSetSpec, serial: Serial) -> Result<RenderedZoneSet, WatchdogError> {
        let synth = ZoneSynthesizer::new(serial, &self.addresses);
        let blocked_path = self.layout.registered_path(BLOCKED_FILE);

        let mut zones = Vec::new();
        let mut registrations = String::new();
        let mut report = GenerationReport::default();

        for (root, root_spec) in spec.iter() {
            if spec::is_reserved_root(root) {
                return Err(WatchdogError::Config(format!(
                    "root domain {root:?} collides with a built-in zone"
                )));
            }
            let registered = match synth.zone(root, root_spec)? {
                Some(zone) => {
                    report.zones_written += 1;
                    report.a_records += zone.a_records().len();
                    report.aaaa_records += zone.aaaa_records().len();

                    let file_name = zone_file_name(root);
                    let path = self.layout.registered_path(&file_name);
                    zones.push((file_name, zone.render()));
                    path
                }
                None => {
                    report.blocked_roots += 1;
                    blocked_path.clone()
                }
            };
            registrations.push_str(&stanza(root, &registered));
            registrations.push('\n');
        }

        let gate_file = zone_file_name(GATE_ZONE);
        Ok(RenderedZoneSet {
            zones,
            blocked: synth.blocked().render(),
            gate: synth.gate().render(),
            registrations,
            gate_registration: stanza(GATE_ZONE, &self.layout.registered_path(&gate_file)),
            report,
        })
    }

    /// Regenerate everything for `spec`, stamping zones with `serial`.
    ///
    /// Zones are rendered before the old output is removed, so a bad
    /// pattern leaves the previous generation in place. A filesystem error
    /// after that point can leave the directory partially written.
    pub fn generate(&self, spec: &ZoneSetSpec, serial: Serial) -> Result<GenerationReport, WatchdogError> {
        let timer = metrics::Timer::start();

        let rendered = match self.render(spec, serial) {
            Ok(rendered) => rendered,
            Err(e) => {
                metrics::record_regeneration_error(&e, timer.elapsed());
                return Err(e);
            }
        };

        if let Err(e) = self.write(&rendered) {
            metrics::record_regeneration_error(&e, timer.elapsed());
            return Err(e);
        }

        let report = rendered.report;
        metrics::record_regeneration(metrics::RegenerationResult::Success, timer.elapsed());
        metrics::record_zone_set(
            report.zones_written,
            report.blocked_roots,
            report.a_records,
            report.aaaa_records,
        );
        info!(
            zone_dir = %self.layout.zone_dir.display(),
            conf_file = %self.layout.conf_file.display(),
            serial = %serial,
            zones = report.zones_written,
            blocked = report.blocked_roots,
            a_records = report.a_records,
            aaaa_records = report.aaaa_records,
            "Zone set regenerated"
        );
        Ok(report)
    }

    /// Regenerate with today's UTC serial.
    pub fn generate_today(&self, spec: &ZoneSetSpec) -> Result<GenerationReport, WatchdogError> {
        self.generate(spec, Serial::today())
    }

    fn write(&self, rendered: &RenderedZoneSet) -> Result<(), WatchdogError> {
        let dir = &self.layout.zone_dir;
        match fs::remove_dir_all(dir) {
            Ok(()) => debug!(dir = %dir.display(), "Removed previous zone directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(WatchdogError::fs(dir, e)),
        }
        fs::create_dir_all(dir).map_err(|e| WatchdogError::fs(dir, e))?;

        for (file_name, content) in &rendered.zones {
            write_file(&dir.join(file_name), content)?;
            debug!(file = %file_name, "Wrote zone file");
        }

        write_file(&self.layout.conf_file, &rendered.registrations)?;
        write_file(&dir.join(BLOCKED_FILE), &rendered.blocked)?;
        write_file(&dir.join(zone_file_name(GATE_ZONE)), &rendered.gate)?;
        append_file(&self.layout.conf_file, &rendered.gate_registration)?;
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), WatchdogError> {
    fs::write(path, content).map_err(|e| WatchdogError::fs(path, e))
}

fn append_file(path: &Path, content: &str) -> Result<(), WatchdogError> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| WatchdogError::fs(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| WatchdogError::fs(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::RootZoneSpec;

    fn generator() -> ZoneSetGenerator {
        ZoneSetGenerator::new(
            OutputLayout::new("/etc/bind/zones", "/etc/bind/named.conf.local"),
            ResolvedAddresses::unspecified(),
        )
    }

    #[test]
    fn test_master_file_stanzas() {
        let spec = ZoneSetSpec::from_json(
            r#"{"example.com": {"ip_v4": {"www": "1.1.1.1"}}, "ads.net": "{{BLOCKED}}"}"#,
        )
        .unwrap();
        let rendered = generator().render(&spec, Serial::FIXED).unwrap();

        let expected = "\
zone \"example.com\" {
    type master;
    file \"/etc/bind/zones/db.example.com\";
};

zone \"ads.net\" {
    type master;
    file \"/etc/bind/zones/db.blocked\";
};

";
        assert_eq!(rendered.registrations, expected);
        assert_eq!(
            rendered.gate_registration,
            "zone \"the.gate\" {\n    type master;\n    file \"/etc/bind/zones/db.the.gate\";\n};\n"
        );
    }

    #[test]
    fn test_blocked_roots_get_no_zone_file() {
        let spec = ZoneSetSpec::from_json(r#"{"ads.net": "{{BLOCKED}}"}"#).unwrap();
        let rendered = generator().render(&spec, Serial::FIXED).unwrap();
        assert!(rendered.zones.is_empty());
        assert_eq!(rendered.report.blocked_roots, 1);
    }

    #[test]
    fn test_registered_dir_override() {
        let gen = ZoneSetGenerator::new(
            OutputLayout::new("/tmp/out/zones", "/tmp/out/named.conf.local")
                .with_registered_dir("/etc/bind/zones"),
            ResolvedAddresses::unspecified(),
        );
        let rendered = gen.render(&ZoneSetSpec::new(), Serial::FIXED).unwrap();
        assert!(rendered
            .gate_registration
            .contains("file \"/etc/bind/zones/db.the.gate\";"));
    }

    #[test]
    fn test_reserved_root_pushed_directly_is_rejected() {
        let mut spec = ZoneSetSpec::new();
        spec.push("the.gate", RootZoneSpec::Blocked);
        assert!(matches!(
            generator().render(&spec, Serial::FIXED),
            Err(WatchdogError::Config(_))
        ));
    }

    #[test]
    fn test_report_counts() {
        let spec = ZoneSetSpec::from_json(
            r#"{"example.com": {"ip_v4": {"a|b": "1.2.3.4"}, "ip_v6": {"c": "::1"}}}"#,
        )
        .unwrap();
        let report = generator().render(&spec, Serial::FIXED).unwrap().report;
        assert_eq!(
            report,
            GenerationReport {
                zones_written: 1,
                blocked_roots: 0,
                a_records: 2,
                aaaa_records: 1,
            }
        );
    }
}
