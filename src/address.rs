//! Host address resolution.
//!
//! Addresses are resolved once at startup into [`ResolvedAddresses`] and
//! passed by reference into every regeneration.

use std::fmt;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::AddressConfig;

/// Address family of a record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// IPv4, emitted as A records.
    V4,
    /// IPv6, emitted as AAAA records.
    V6,
}

impl Family {
    /// Zone file record type for this family.
    pub fn record_type(self) -> &'static str {
        match self {
            Family::V4 => "A",
            Family::V6 => "AAAA",
        }
    }

    /// Null address used when nothing better is known.
    pub fn unspecified(self) -> &'static str {
        match self {
            Family::V4 => "0.0.0.0",
            Family::V6 => "::",
        }
    }

    /// Public resolver used to ask the kernel which source address it
    /// would pick for outbound traffic.
    fn route_probe(self) -> &'static str {
        match self {
            Family::V4 => "1.1.1.1",
            Family::V6 => "2606:4700:4700::1111",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => f.write_str("ipv4"),
            Family::V6 => f.write_str("ipv6"),
        }
    }
}

/// Source of default outbound addresses.
pub trait AddressDiscovery {
    /// Discover this host's outbound address for `family`, if any.
    fn discover(&self, family: Family) -> Option<String>;
}

/// Discovers addresses from the routing table via `ip route get`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteDiscovery;

impl AddressDiscovery for RouteDiscovery {
    fn discover(&self, family: Family) -> Option<String> {
        let probe = family.route_probe();
        let output = match Command::new("ip").args(["route", "get", probe]).output() {
            Ok(output) => output,
            Err(e) => {
                warn!(%family, "Could not run `ip route get {}`: {}", probe, e);
                return None;
            }
        };

        if !output.status.success() {
            debug!(%family, status = %output.status, "No route to probe address");
            return None;
        }

        let addr = parse_route_src(&String::from_utf8_lossy(&output.stdout));
        debug!(%family, addr = ?addr, "Discovered outbound address");
        addr
    }
}

/// Discovery that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscovery;

impl AddressDiscovery for NoDiscovery {
    fn discover(&self, _family: Family) -> Option<String> {
        None
    }
}

/// Extract the `src` address from the first line of `ip route get` output.
///
/// e.g. `1.1.1.1 via 10.0.0.1 dev eth0 src 10.0.0.5 uid 1000` -> `10.0.0.5`
pub fn parse_route_src(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "src" {
            return tokens.next().map(str::to_string);
        }
    }
    None
}

/// Addresses used for `{{SELF}}` targets and the gate zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddresses {
    /// This host's IPv4 address.
    pub ipv4: String,
    /// This host's IPv6 address.
    pub ipv6: String,
    /// IPv4 redirect address.
    pub redirect_ipv4: String,
    /// IPv6 redirect address.
    pub redirect_ipv6: String,
}

impl ResolvedAddresses {
    /// All four addresses set to the unspecified address.
    pub fn unspecified() -> Self {
        Self {
            ipv4: Family::V4.unspecified().to_string(),
            ipv6: Family::V6.unspecified().to_string(),
            redirect_ipv4: Family::V4.unspecified().to_string(),
            redirect_ipv6: Family::V6.unspecified().to_string(),
        }
    }

    /// Resolve addresses from configuration, consulting `discovery` at most
    /// once per family and only when an explicit value is missing.
    pub fn resolve(config: &AddressConfig, discovery: &dyn AddressDiscovery) -> Self {
        let (ipv4, redirect_ipv4) = resolve_family(
            Family::V4,
            config.skip_ipv4,
            config.ipv4.as_deref(),
            config.redirect_ipv4.as_deref(),
            discovery,
        );
        let (ipv6, redirect_ipv6) = resolve_family(
            Family::V6,
            config.skip_ipv6,
            config.ipv6.as_deref(),
            config.redirect_ipv6.as_deref(),
            discovery,
        );

        let resolved = Self {
            ipv4,
            ipv6,
            redirect_ipv4,
            redirect_ipv6,
        };
        info!(
            ipv4 = %resolved.ipv4,
            ipv6 = %resolved.ipv6,
            redirect_ipv4 = %resolved.redirect_ipv4,
            redirect_ipv6 = %resolved.redirect_ipv6,
            "Resolved host addresses"
        );
        resolved
    }

    /// Host address for `family`.
    pub fn host(&self, family: Family) -> &str {
        match family {
            Family::V4 => &self.ipv4,
            Family::V6 => &self.ipv6,
        }
    }

    /// Redirect address for `family`.
    pub fn redirect(&self, family: Family) -> &str {
        match family {
            Family::V4 => &self.redirect_ipv4,
            Family::V6 => &self.redirect_ipv6,
        }
    }
}

fn resolve_family(
    family: Family,
    skip: bool,
    host: Option<&str>,
    redirect: Option<&str>,
    discovery: &dyn AddressDiscovery,
) -> (String, String) {
    let fallback = family.unspecified();
    if skip {
        return (fallback.to_string(), fallback.to_string());
    }

    let host = host.map(str::trim).filter(|s| !s.is_empty());
    let redirect = redirect.map(str::trim).filter(|s| !s.is_empty());

    let discovered = if host.is_none() || redirect.is_none() {
        discovery.discover(family)
    } else {
        None
    };
    let pick = |explicit: Option<&str>| {
        explicit
            .or(discovered.as_deref())
            .unwrap_or(fallback)
            .to_string()
    };

    (pick(host), pick(redirect))
}
