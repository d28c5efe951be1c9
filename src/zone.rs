//! Zone file synthesis.
//!
//! Every zone shares one header layout:
//!
//! ```text
//! $TTL 3600
//! ;; SOA Record
//! @ IN SOA ns.the.gate root.the.gate. 20240131 7200 3600 86400 3600
//!
//! ;; NS Records
//! @ IN NS ns.the.gate.
//!
//! ;; A Records
//! www IN A 10.0.0.1
//!
//! ;; AAAA Records
//! www IN AAAA fd00::1
//! ```

use std::fmt;

use chrono::{Datelike, NaiveDate, Utc};

use crate::address::{Family, ResolvedAddresses};
use crate::error::WatchdogError;
use crate::records::{AddressRecord, ResolvedTable};
use crate::spec::RootZoneSpec;

/// Nameserver every zone delegates to.
pub const AUTHORITY: &str = "ns.the.gate";

/// Responsible mailbox in the SOA record.
pub const HOSTMASTER: &str = "root.the.gate.";

/// Name of the always-present bootstrap zone.
pub const GATE_ZONE: &str = "the.gate";

/// File name of the shared sinkhole zone.
pub const BLOCKED_FILE: &str = "db.blocked";

/// Default TTL for every record.
pub const DEFAULT_TTL: u32 = 3600;

const REFRESH: u32 = 7200;
const RETRY: u32 = 3600;
const EXPIRE: u32 = 86400;
const MINIMUM: u32 = 3600;

/// SOA serial as a `YYYYMMDD` date stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(u32);

impl Serial {
    /// Serial of the static sinkhole and bootstrap zones.
    pub const FIXED: Serial = Serial(20200103);

    /// Serial for a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        let year = u32::try_from(date.year()).unwrap_or(0);
        Self(year * 10_000 + date.month() * 100 + date.day())
    }

    /// Serial for the current UTC date.
    pub fn today() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    /// Numeric value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

/// A synthesized zone: SOA and NS headers plus address records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFile {
    serial: Serial,
    a: Vec<AddressRecord>,
    aaaa: Vec<AddressRecord>,
}

impl ZoneFile {
    /// Assemble a zone from already-built records.
    pub fn new(serial: Serial, a: Vec<AddressRecord>, aaaa: Vec<AddressRecord>) -> Self {
        Self { serial, a, aaaa }
    }

    /// SOA serial.
    pub fn serial(&self) -> Serial {
        self.serial
    }

    /// A records in output order.
    pub fn a_records(&self) -> &[AddressRecord] {
        &self.a
    }

    /// AAAA records in output order.
    pub fn aaaa_records(&self) -> &[AddressRecord] {
        &self.aaaa
    }

    /// Render as BIND master-file text.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ZoneFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "$TTL {DEFAULT_TTL}")?;
        writeln!(f, ";; SOA Record")?;
        writeln!(
            f,
            "@ IN SOA {AUTHORITY} {HOSTMASTER} {} {REFRESH} {RETRY} {EXPIRE} {MINIMUM}",
            self.serial
        )?;
        writeln!(f)?;
        writeln!(f, ";; NS Records")?;
        writeln!(f, "@ IN NS {AUTHORITY}.")?;
        writeln!(f)?;
        writeln!(f, ";; A Records")?;
        for record in &self.a {
            writeln!(f, "{record}")?;
        }
        writeln!(f)?;
        writeln!(f, ";; AAAA Records")?;
        for record in &self.aaaa {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}

/// Builds zones for one regeneration pass.
#[derive(Debug, Clone, Copy)]
pub struct ZoneSynthesizer<'a> {
    serial: Serial,
    addresses: &'a ResolvedAddresses,
}

impl<'a> ZoneSynthesizer<'a> {
    /// Create a synthesizer stamping zones with `serial`.
    pub fn new(serial: Serial, addresses: &'a ResolvedAddresses) -> Self {
        Self { serial, addresses }
    }

    /// Synthesize the zone for one root domain, or `None` if it is blocked.
    pub fn zone(&self, root: &str, spec: &RootZoneSpec) -> Result<Option<ZoneFile>, WatchdogError> {
        let RootZoneSpec::Tables { ip_v4, ip_v6 } = spec else {
            return Ok(None);
        };

        let a = ResolvedTable::resolve(ip_v4, Family::V4, self.addresses).records(root)?;
        let aaaa = ResolvedTable::resolve(ip_v6, Family::V6, self.addresses).records(root)?;
        Ok(Some(ZoneFile::new(self.serial, a, aaaa)))
    }

    /// Sinkhole zone shared by every blocked root.
    pub fn blocked(&self) -> ZoneFile {
        blocked_zone()
    }

    /// Bootstrap zone answering for `the.gate`.
    pub fn gate(&self) -> ZoneFile {
        gate_zone(self.addresses)
    }
}

/// Sinkhole zone: apex and wildcard point at the null address.
pub fn blocked_zone() -> ZoneFile {
    let a = vec![
        AddressRecord::new("@", Family::V4, Family::V4.unspecified()),
        AddressRecord::new("*", Family::V4, Family::V4.unspecified()),
    ];
    let aaaa = vec![
        AddressRecord::new("@", Family::V6, Family::V6.unspecified()),
        AddressRecord::new("*", Family::V6, Family::V6.unspecified()),
    ];
    ZoneFile::new(Serial::FIXED, a, aaaa)
}

/// Bootstrap zone: apex and `ns` point at the redirect addresses, anything
/// else at the null address.
pub fn gate_zone(addresses: &ResolvedAddresses) -> ZoneFile {
    let records = |family: Family| {
        let redirect = addresses.redirect(family);
        vec![
            AddressRecord::new("@", family, redirect),
            AddressRecord::new("ns", family, redirect),
            AddressRecord::new("*", family, family.unspecified()),
        ]
    };
    ZoneFile::new(Serial::FIXED, records(Family::V4), records(Family::V6))
}
