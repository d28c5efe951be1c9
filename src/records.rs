//! Address record synthesis for one pattern table.

use std::fmt;

use crate::address::{Family, ResolvedAddresses};
use crate::error::WatchdogError;
use crate::pattern::Pattern;
use crate::spec::{DomainTable, Target};

/// Resolve a target to a concrete address for `family`.
///
/// Literal addresses are passed through without validation.
pub fn resolve_target<'a>(
    target: &'a Target,
    family: Family,
    addresses: &'a ResolvedAddresses,
) -> &'a str {
    match target {
        Target::Literal(addr) => addr,
        Target::SelfRedirect => addresses.redirect(family),
    }
}

/// A table entry whose target has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// Pattern text as written in the specification.
    pub pattern: String,
    /// Concrete address for every name the pattern expands to.
    pub address: String,
}

/// A domain table with every target resolved for one family.
///
/// Built fresh from the specification; the specification itself is never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTable {
    family: Family,
    entries: Vec<ResolvedEntry>,
}

impl ResolvedTable {
    /// Resolve every target in `table` once.
    pub fn resolve(table: &DomainTable, family: Family, addresses: &ResolvedAddresses) -> Self {
        let entries = table
            .iter()
            .map(|(pattern, target)| ResolvedEntry {
                pattern: pattern.to_string(),
                address: resolve_target(target, family, addresses).to_string(),
            })
            .collect();
        Self { family, entries }
    }

    /// Family the table was resolved for.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Resolved entries in table order.
    pub fn entries(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    /// Expand every pattern into address records.
    ///
    /// Records follow table order, then expansion order. The first pattern
    /// that fails aborts the whole table.
    pub fn records(&self, root: &str) -> Result<Vec<AddressRecord>, WatchdogError> {
        let mut records = Vec::new();
        for entry in &self.entries {
            let names = Pattern::parse(&entry.pattern)
                .and_then(|p| p.expand())
                .map_err(|source| WatchdogError::PatternExpansion {
                    root: root.to_string(),
                    pattern: entry.pattern.clone(),
                    source,
                })?;

            records.extend(names.into_iter().map(|name| AddressRecord {
                name: if name.is_empty() { "@".to_string() } else { name },
                family: self.family,
                address: entry.address.clone(),
            }));
        }
        Ok(records)
    }
}

/// One `A` or `AAAA` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Owner name relative to the zone origin (`@` for the apex).
    pub name: String,
    /// Record family.
    pub family: Family,
    /// Target address.
    pub address: String,
}

impl AddressRecord {
    /// Build a record.
    pub fn new(name: impl Into<String>, family: Family, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family,
            address: address.into(),
        }
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} IN {} {}",
            self.name,
            self.family.record_type(),
            self.address
        )
    }
}

/// Resolve and expand `table` into records for `family`.
pub fn build_records(
    root: &str,
    table: &DomainTable,
    family: Family,
    addresses: &ResolvedAddresses,
) -> Result<Vec<AddressRecord>, WatchdogError> {
    ResolvedTable::resolve(table, family, addresses).records(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternError;

    fn addresses() -> ResolvedAddresses {
        ResolvedAddresses {
            ipv4: "192.168.1.2".into(),
            ipv6: "fd00::2".into(),
            redirect_ipv4: "10.9.9.9".into(),
            redirect_ipv6: "fd00::99".into(),
        }
    }

    fn lines(records: &[AddressRecord]) -> Vec<String> {
        records.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_literal_passes_through_unchanged() {
        let target = Target::Literal("not-an-ip".into());
        assert_eq!(resolve_target(&target, Family::V4, &addresses()), "not-an-ip");
    }

    #[test]
    fn test_self_resolves_per_family() {
        let addrs = addresses();
        assert_eq!(resolve_target(&Target::SelfRedirect, Family::V4, &addrs), "10.9.9.9");
        assert_eq!(resolve_target(&Target::SelfRedirect, Family::V6, &addrs), "fd00::99");
    }

    #[test]
    fn test_records_follow_table_then_expansion_order() {
        let mut table = DomainTable::new();
        table.push("www|mail", Target::SelfRedirect);
        table.push("api[12]", Target::Literal("10.0.0.7".into()));

        let records = build_records("example.com", &table, Family::V4, &addresses()).unwrap();
        assert_eq!(
            lines(&records),
            vec![
                "www IN A 10.9.9.9",
                "mail IN A 10.9.9.9",
                "api1 IN A 10.0.0.7",
                "api2 IN A 10.0.0.7",
            ]
        );
    }

    #[test]
    fn test_aaaa_records() {
        let mut table = DomainTable::new();
        table.push("v6", Target::SelfRedirect);
        let records = build_records("example.com", &table, Family::V6, &addresses()).unwrap();
        assert_eq!(lines(&records), vec!["v6 IN AAAA fd00::99"]);
    }

    #[test]
    fn test_empty_expansion_is_apex() {
        let mut table = DomainTable::new();
        table.push("(www)?", Target::Literal("1.2.3.4".into()));
        let records = build_records("example.com", &table, Family::V4, &addresses()).unwrap();
        assert_eq!(lines(&records), vec!["@ IN A 1.2.3.4", "www IN A 1.2.3.4"]);
    }

    #[test]
    fn test_empty_pattern_produces_no_records() {
        let mut table = DomainTable::new();
        table.push("", Target::Literal("1.2.3.4".into()));
        let records = build_records("example.com", &table, Family::V4, &addresses()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_resolution_happens_once_per_entry() {
        let mut table = DomainTable::new();
        table.push("[a-c]", Target::SelfRedirect);
        let resolved = ResolvedTable::resolve(&table, Family::V4, &addresses());

        assert_eq!(resolved.entries().len(), 1);
        assert_eq!(resolved.entries()[0].address, "10.9.9.9");
        assert_eq!(resolved.records("example.com").unwrap().len(), 3);
    }

    #[test]
    fn test_spec_table_is_not_mutated() {
        let mut table = DomainTable::new();
        table.push("www", Target::SelfRedirect);
        let before = table.clone();
        let _ = build_records("example.com", &table, Family::V4, &addresses()).unwrap();
        assert_eq!(table, before);
    }

    #[test]
    fn test_bad_pattern_aborts_whole_table() {
        let mut table = DomainTable::new();
        table.push("ok", Target::SelfRedirect);
        table.push("bad+", Target::SelfRedirect);

        let err = build_records("example.com", &table, Family::V4, &addresses()).unwrap_err();
        match err {
            WatchdogError::PatternExpansion {
                root,
                pattern,
                source,
            } => {
                assert_eq!(root, "example.com");
                assert_eq!(pattern, "bad+");
                assert!(matches!(source, PatternError::Unbounded { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
