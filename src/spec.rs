//! Zone set specification document.
//!
//! The document is a JSON object mapping root domains to either the
//! `"{{BLOCKED}}"` sentinel or a pair of pattern tables:
//!
//! ```json
//! {
//!   "example.com": {
//!     "ip_v4": { "www|mail": "{{SELF}}", "api": "10.0.0.7" },
//!     "ip_v6": { "www": "fd00::7" }
//!   },
//!   "ads.example.net": "{{BLOCKED}}"
//! }
//! ```
//!
//! Sentinels are decoded into tagged variants here so nothing downstream
//! compares against reserved strings. Document order is preserved and
//! duplicate keys are rejected.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::zone::{BLOCKED_FILE, GATE_ZONE};

/// Sentinel target resolving to this host's redirect address.
pub const SELF_SENTINEL: &str = "{{SELF}}";

/// Sentinel root value sending the whole domain to the sinkhole zone.
pub const BLOCKED_SENTINEL: &str = "{{BLOCKED}}";

/// Where a pattern's names should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An address written through as-is.
    Literal(String),
    /// This host's redirect address for the table's protocol family.
    SelfRedirect,
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            SELF_SENTINEL => Ok(Target::SelfRedirect),
            BLOCKED_SENTINEL => Err(de::Error::custom(
                "{{BLOCKED}} is only valid as the value of a whole root domain",
            )),
            _ => Ok(Target::Literal(raw)),
        }
    }
}

/// Ordered pattern -> target mapping for one protocol family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainTable {
    entries: Vec<(String, Target)>,
}

impl DomainTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, pattern: impl Into<String>, target: Target) {
        self.entries.push((pattern.into(), target));
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for DomainTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_map(UniqueMapVisitor::new("domain pattern"))
            .map(|entries| Self { entries })
    }
}

/// Specification for one root domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootZoneSpec {
    /// Every name under this root answers from the sinkhole zone.
    Blocked,
    /// The root gets its own zone built from these tables.
    Tables {
        /// Patterns producing A records.
        ip_v4: DomainTable,
        /// Patterns producing AAAA records.
        ip_v6: DomainTable,
    },
}

impl RootZoneSpec {
    /// True for the `{{BLOCKED}}` sentinel.
    pub fn is_blocked(&self) -> bool {
        matches!(self, RootZoneSpec::Blocked)
    }
}

#[derive(Deserialize)]
struct TablesDoc {
    #[serde(default)]
    ip_v4: DomainTable,
    #[serde(default)]
    ip_v6: DomainTable,
}

impl<'de> Deserialize<'de> for RootZoneSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RootVisitor;

        impl<'de> Visitor<'de> for RootVisitor {
            type Value = RootZoneSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "\"{BLOCKED_SENTINEL}\" or an object with ip_v4/ip_v6 tables")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v == BLOCKED_SENTINEL {
                    Ok(RootZoneSpec::Blocked)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                let doc = TablesDoc::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(RootZoneSpec::Tables {
                    ip_v4: doc.ip_v4,
                    ip_v6: doc.ip_v6,
                })
            }
        }

        deserializer.deserialize_any(RootVisitor)
    }
}

/// The whole configuration document: root domain -> specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSetSpec {
    roots: Vec<(String, RootZoneSpec)>,
}

impl ZoneSetSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse a UTF-8 JSON document from bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Append a root domain.
    pub fn push(&mut self, root: impl Into<String>, spec: RootZoneSpec) {
        self.roots.push((root.into(), spec));
    }

    /// Root domains in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RootZoneSpec)> {
        self.roots.iter().map(|(r, s)| (r.as_str(), s))
    }

    /// Look up a root domain.
    pub fn get(&self, root: &str) -> Option<&RootZoneSpec> {
        self.roots.iter().find(|(r, _)| r == root).map(|(_, s)| s)
    }

    /// Number of root domains.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// True if no root domains are declared.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl<'de> Deserialize<'de> for ZoneSetSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roots: Vec<(String, RootZoneSpec)> =
            deserializer.deserialize_map(UniqueMapVisitor::new("root domain"))?;
        if let Some((root, _)) = roots.iter().find(|(r, _)| !is_valid_root(r)) {
            return Err(de::Error::custom(format!("invalid root domain {root:?}")));
        }
        if let Some((root, _)) = roots.iter().find(|(r, _)| is_reserved_root(r)) {
            return Err(de::Error::custom(format!("reserved root domain {root:?}")));
        }
        Ok(Self { roots })
    }
}

/// Root names become file names and quoted strings in the master file.
fn is_valid_root(root: &str) -> bool {
    !root.is_empty()
        && !root.starts_with('.')
        && !root
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '"' || c.is_whitespace() || c.is_control())
}

/// Roots that would collide with the bootstrap zone or the sinkhole file.
pub(crate) fn is_reserved_root(root: &str) -> bool {
    let name = root.trim_end_matches('.');
    name.eq_ignore_ascii_case(GATE_ZONE) || format!("db.{name}").eq_ignore_ascii_case(BLOCKED_FILE)
}

/// Collects a JSON object into an ordered vector, rejecting repeated keys.
struct UniqueMapVisitor<V> {
    what: &'static str,
    marker: PhantomData<V>,
}

impl<V> UniqueMapVisitor<V> {
    fn new(what: &'static str) -> Self {
        Self {
            what,
            marker: PhantomData,
        }
    }
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueMapVisitor<V> {
    type Value = Vec<(String, V)>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an object keyed by {}", self.what)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<String>()? {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(de::Error::custom(format!(
                    "duplicate {} {key:?}",
                    self.what
                )));
            }
            let value = map.next_value()?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tables_and_blocked() {
        let spec = ZoneSetSpec::from_json(
            r#"{
                "example.com": {
                    "ip_v4": {"www": "{{SELF}}", "api": "10.0.0.7"},
                    "ip_v6": {"www": "fd00::7"}
                },
                "ads.example.net": "{{BLOCKED}}"
            }"#,
        )
        .unwrap();

        assert_eq!(spec.len(), 2);
        assert!(spec.get("ads.example.net").unwrap().is_blocked());

        let RootZoneSpec::Tables { ip_v4, ip_v6 } = spec.get("example.com").unwrap() else {
            panic!("expected tables");
        };
        let v4: Vec<_> = ip_v4.iter().collect();
        assert_eq!(v4[0], ("www", &Target::SelfRedirect));
        assert_eq!(v4[1], ("api", &Target::Literal("10.0.0.7".to_string())));
        assert_eq!(ip_v6.len(), 1);
    }

    #[test]
    fn test_document_order_is_preserved() {
        let spec = ZoneSetSpec::from_json(r#"{"zeta.org": "{{BLOCKED}}", "alpha.org": "{{BLOCKED}}", "mid.org": "{{BLOCKED}}"}"#)
            .unwrap();
        let roots: Vec<_> = spec.iter().map(|(r, _)| r).collect();
        assert_eq!(roots, vec!["zeta.org", "alpha.org", "mid.org"]);
    }

    #[test]
    fn test_missing_table_defaults_to_empty() {
        let spec = ZoneSetSpec::from_json(r#"{"example.com": {"ip_v4": {"a": "1.2.3.4"}}}"#)
            .unwrap();
        let RootZoneSpec::Tables { ip_v6, .. } = spec.get("example.com").unwrap() else {
            panic!("expected tables");
        };
        assert!(ip_v6.is_empty());
    }

    #[test]
    fn test_duplicate_root_rejected() {
        let err = ZoneSetSpec::from_json(
            r#"{"example.com": "{{BLOCKED}}", "example.com": "{{BLOCKED}}"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate root domain"));
    }

    #[test]
    fn test_duplicate_pattern_rejected() {
        let err = ZoneSetSpec::from_json(
            r#"{"example.com": {"ip_v4": {"a": "1.1.1.1", "a": "2.2.2.2"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate domain pattern"));
    }

    #[test]
    fn test_blocked_target_inside_table_rejected() {
        let err =
            ZoneSetSpec::from_json(r#"{"example.com": {"ip_v4": {"a": "{{BLOCKED}}"}}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("only valid"));
    }

    #[test]
    fn test_unknown_root_string_rejected() {
        assert!(ZoneSetSpec::from_json(r#"{"example.com": "{{SELF}}"}"#).is_err());
    }

    #[test]
    fn test_root_names_that_escape_the_zone_dir_rejected() {
        for bad in ["", "../etc", "a/b", "has space", "quo\"te", ".hidden"] {
            let doc = format!(r#"{{"{}": "{{{{BLOCKED}}}}"}}"#, bad.replace('"', "\\\""));
            assert!(ZoneSetSpec::from_json(&doc).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_roots_colliding_with_fixed_zones_rejected() {
        for reserved in ["the.gate", "THE.gate", "the.gate.", "blocked"] {
            let doc = format!(r#"{{"{reserved}": {{"ip_v4": {{"www": "1.1.1.1"}}}}}}"#);
            let err = ZoneSetSpec::from_json(&doc).unwrap_err();
            assert!(
                err.to_string().contains("reserved root domain"),
                "{reserved:?} should be reserved, got {err}"
            );
        }
        assert!(ZoneSetSpec::from_json(r#"{"gate": "{{BLOCKED}}", "blocked.net": "{{BLOCKED}}"}"#).is_ok());
    }

    #[test]
    fn test_empty_document() {
        assert!(ZoneSetSpec::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document() {
        assert!(ZoneSetSpec::from_json("[1, 2]").is_err());
        assert!(ZoneSetSpec::from_slice(b"{not json").is_err());
    }
}
