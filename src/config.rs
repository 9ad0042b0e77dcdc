use crate::wol::{MacAddr, DEFAULT_WOL_PORT};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

/// Global configuration for the gateway
///
/// Loaded once at startup and immutable for the process lifetime; there is
/// no reload mechanism.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Wake loop settings
    #[serde(default)]
    pub wake: WakeConfig,

    /// Host-pattern to machine-id table. Order matters: resolution is
    /// first-match-wins in declared order, so this is an `IndexMap` rather
    /// than a `HashMap`.
    #[serde(default)]
    pub services: IndexMap<String, String>,

    /// Machine-id to machine record table
    #[serde(default)]
    pub machines: HashMap<String, Machine>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port (default: 301)
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_listen_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WakeConfig {
    /// Destination port for magic packets (default: 9)
    #[serde(default = "default_wol_port")]
    pub wol_port: u16,

    /// Timeout for each liveness probe in seconds (default: 1)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Maximum wake attempts before giving up with 504. Unset means the
    /// loop is unbounded and the request is held open until the machine
    /// answers, which is the historical behavior.
    pub max_attempts: Option<u32>,
}

impl WakeConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            wol_port: default_wol_port(),
            probe_timeout_secs: default_probe_timeout(),
            max_attempts: None,
        }
    }
}

/// A physical machine the gateway can wake
#[derive(Debug, Deserialize, Clone)]
pub struct Machine {
    /// MAC address in any common colon/dash/dot-delimited form
    pub mac: String,

    /// IPv4 broadcast address for the machine's network
    pub broadcast_ip: String,

    /// HTTP(S) URL probed to decide whether the machine is awake
    pub status_url: String,
}

impl Machine {
    pub fn mac_addr(&self) -> Result<MacAddr, crate::error::WolError> {
        self.mac.parse()
    }

    pub fn broadcast_addr(&self) -> Result<Ipv4Addr, std::net::AddrParseError> {
        self.broadcast_ip.parse()
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    301
}

fn default_wol_port() -> u16 {
    DEFAULT_WOL_PORT
}

fn default_probe_timeout() -> u64 {
    1
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration eagerly so a bad pattern or MAC fails at
    /// startup instead of on the first matching request.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for (pattern, machine_id) in &self.services {
            if let Err(e) = regex::Regex::new(&format!("^(?:{pattern})$")) {
                errors.push(format!("service pattern '{pattern}' is not a valid regex: {e}"));
            }
            if !self.machines.contains_key(machine_id) {
                errors.push(format!(
                    "service pattern '{pattern}' targets unknown machine '{machine_id}'"
                ));
            }
        }

        for (machine_id, machine) in &self.machines {
            if let Err(e) = machine.mac_addr() {
                errors.push(format!("machine '{machine_id}': {e}"));
            }
            if let Err(e) = machine.broadcast_addr() {
                errors.push(format!(
                    "machine '{machine_id}': broadcast_ip '{}' is not a valid IPv4 address: {e}",
                    machine.broadcast_ip
                ));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}
