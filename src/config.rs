//! Configuration types for gate-zones.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Address overrides and discovery switches.
    #[serde(default)]
    pub addresses: AddressConfig,

    /// Nameserver reload command.
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where the specification is read from and where zones are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Zone specification document (JSON).
    #[serde(default = "default_zones_file")]
    pub zones_file: PathBuf,

    /// Directory receiving the generated `db.*` files.
    #[serde(default = "default_zone_dir")]
    pub zone_dir: PathBuf,

    /// Master registration file included by the nameserver.
    #[serde(default = "default_conf_file")]
    pub conf_file: PathBuf,

    /// Directory written into `file "..."` stanzas when the nameserver sees
    /// the zone directory under a different path. Defaults to `zone_dir`.
    #[serde(default)]
    pub registered_zone_dir: Option<PathBuf>,
}

impl PathsConfig {
    /// Layout rooted in a working directory: `zones.json`, `zones/` and
    /// `named.conf.local` side by side.
    pub fn working_dir(dir: &Path) -> Self {
        Self {
            zones_file: dir.join("zones.json"),
            zone_dir: dir.join("zones"),
            conf_file: dir.join("named.conf.local"),
            registered_zone_dir: None,
        }
    }

    /// Directory referenced from the master registration file.
    pub fn registered_dir(&self) -> &Path {
        self.registered_zone_dir.as_deref().unwrap_or(&self.zone_dir)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            zones_file: default_zones_file(),
            zone_dir: default_zone_dir(),
            conf_file: default_conf_file(),
            registered_zone_dir: None,
        }
    }
}

fn default_zones_file() -> PathBuf {
    PathBuf::from("/opt/dns-config-watchdog/zones.json")
}

fn default_zone_dir() -> PathBuf {
    PathBuf::from("/etc/bind/zones")
}

fn default_conf_file() -> PathBuf {
    PathBuf::from("/etc/bind/named.conf.local")
}

/// Explicit addresses and discovery switches.
///
/// Precedence per family: explicit value, then the discovered outbound
/// address, then `0.0.0.0` / `::`. A skipped family always uses the
/// fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressConfig {
    /// This host's IPv4 address.
    #[serde(default)]
    pub ipv4: Option<String>,

    /// This host's IPv6 address.
    #[serde(default)]
    pub ipv6: Option<String>,

    /// IPv4 address `{{SELF}}` and the gate zone resolve to.
    #[serde(default)]
    pub redirect_ipv4: Option<String>,

    /// IPv6 address `{{SELF}}` and the gate zone resolve to.
    #[serde(default)]
    pub redirect_ipv6: Option<String>,

    /// Skip IPv4 entirely.
    #[serde(default)]
    pub skip_ipv4: bool,

    /// Skip IPv6 entirely.
    #[serde(default)]
    pub skip_ipv6: bool,
}

/// Nameserver reload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Shell command run after a successful regeneration.
    #[serde(default = "default_reload_command")]
    pub command: String,

    /// Never run the reload command.
    #[serde(default)]
    pub skip: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            command: default_reload_command(),
            skip: false,
        }
    }
}

fn default_reload_command() -> String {
    "systemctl restart bind9".to_string()
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "gate_zones=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bare environment variables accepted for existing deployments, and the
/// setting each one fills in.
pub const LEGACY_ENV: &[(&str, &str)] = &[
    ("IPV4", "addresses.ipv4"),
    ("IPV6", "addresses.ipv6"),
    ("REDIRECT_IPV4", "addresses.redirect_ipv4"),
    ("REDIRECT_IPV6", "addresses.redirect_ipv6"),
    ("SKIP_IPV4", "addresses.skip_ipv4"),
    ("SKIP_IPV6", "addresses.skip_ipv6"),
    ("DNS_RESTART", "reload.command"),
];

/// Settings derived from [`LEGACY_ENV`], looked up through `lookup`.
///
/// Empty values are treated as unset. A `SKIP_*` variable skips its family
/// unless it is `false`. These are meant to be installed as defaults, so
/// the settings file and `GATE_ZONES__*` variables take precedence.
pub fn legacy_env_defaults(
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<(&'static str, ::config::Value)> {
    LEGACY_ENV
        .iter()
        .filter_map(|&(var, key)| {
            let value = lookup(var).filter(|v| !v.trim().is_empty())?;
            let value = if var.starts_with("SKIP_") {
                ::config::Value::from(!value.trim().eq_ignore_ascii_case("false"))
            } else {
                ::config::Value::from(value)
            };
            Some((key, value))
        })
        .collect()
}
