//! Host resolution: ordered pattern matching over the services table.
//!
//! Patterns are anchored regular expressions matched against the verbatim
//! Host header value. Matching is case-sensitive and no port-stripping or
//! lowercasing is applied, so operators must write patterns against the
//! literal header their proxy forwards (including `:port` where present).

use indexmap::IndexMap;
use regex::Regex;

struct ServiceRule {
    pattern: Regex,
    machine_id: String,
}

/// Resolves hostnames to machine ids, first declared match wins
pub struct HostResolver {
    rules: Vec<ServiceRule>,
}

impl HostResolver {
    /// Compile the services table into an ordered rule list. Each pattern is
    /// wrapped as `^(?:pattern)$` so it must match the whole hostname.
    pub fn new(services: &IndexMap<String, String>) -> anyhow::Result<Self> {
        let mut rules = Vec::with_capacity(services.len());
        for (pattern, machine_id) in services {
            let anchored = Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| anyhow::anyhow!("invalid service pattern '{pattern}': {e}"))?;
            rules.push(ServiceRule {
                pattern: anchored,
                machine_id: machine_id.clone(),
            });
        }
        Ok(Self { rules })
    }

    /// Return the machine id of the first rule fully matching `host`,
    /// or `None` when nothing matches.
    pub fn resolve(&self, host: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(host))
            .map(|rule| rule.machine_id.as_str())
    }
}
