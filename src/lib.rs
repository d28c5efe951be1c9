//! gate-zones - BIND zone generation from pattern-based domain tables.
//!
//! Reads a JSON document mapping root domains to tables of domain patterns
//! and targets, expands every pattern into concrete names, and writes one
//! zone file per root plus a master registration file for the nameserver.
//! In watch mode the document is re-read on every change and the nameserver
//! is told to reload.
//!
//! ## Architecture
//!
//! ```text
//! zones.json ──▶ ZoneSetSpec ──▶ ZoneSetGenerator ──▶ zones/db.<root>
//!     ▲                               │                zones/db.blocked
//!     │                               ▼                zones/db.the.gate
//! ChangeWatcher              ZoneSynthesizer           named.conf.local
//! (notify, 1s debounce)               │                       │
//!                                     ▼                       ▼
//!                            ResolvedTable            ReloadTrigger
//!                       (Pattern + resolve_target)   (systemctl restart)
//! ```
//!
//! ## Specification format
//!
//! ```json
//! {
//!   "example.com": {
//!     "ip_v4": { "www|mail": "{{SELF}}", "node[1-3]": "10.0.0.7" },
//!     "ip_v6": { "www": "fd00::7" }
//!   },
//!   "ads.example.net": "{{BLOCKED}}"
//! }
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use gate_zones::{OutputLayout, ResolvedAddresses, ZoneSetGenerator, ZoneSetSpec};
//!
//! let spec = ZoneSetSpec::from_json(r#"{"example.com": {"ip_v4": {"a|b": "1.2.3.4"}}}"#)?;
//! let generator = ZoneSetGenerator::new(
//!     OutputLayout::new("/etc/bind/zones", "/etc/bind/named.conf.local"),
//!     ResolvedAddresses::unspecified(),
//! );
//! generator.generate_today(&spec)?;
//! ```

#![warn(missing_docs)]

pub mod address;
pub mod config;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod pattern;
pub mod records;
pub mod reload;
pub mod service;
pub mod source;
pub mod spec;
pub mod telemetry;
pub mod watcher;
pub mod zone;

// Re-export main types
pub use address::{Family, ResolvedAddresses};
pub use config::{AddressConfig, Config, PathsConfig, ReloadConfig, TelemetryConfig};
pub use error::WatchdogError;
pub use generator::{GenerationReport, OutputLayout, ZoneSetGenerator};
pub use pattern::{Pattern, PatternError};
pub use service::Watchdog;
pub use source::SpecSource;
pub use spec::{DomainTable, RootZoneSpec, Target, ZoneSetSpec};
pub use watcher::ChangeWatcher;
pub use zone::{Serial, ZoneFile};
