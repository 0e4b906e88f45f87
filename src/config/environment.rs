//! Host environment classification by address

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Classify a host by its addresses. Production is checked first, then
    /// staging, then testing; a host listed nowhere is a development host.
    pub fn classify(table: &HashMap<Environment, Vec<String>>, host_addresses: &[IpAddr]) -> Self {
        for candidate in [
            Environment::Production,
            Environment::Staging,
            Environment::Testing,
        ] {
            let Some(listed) = table.get(&candidate) else {
                continue;
            };
            let hit = listed
                .iter()
                .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
                .any(|addr| host_addresses.contains(&addr));
            if hit {
                return candidate;
            }
        }
        Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addresses of the executing host: loopback plus whatever the hostname
/// resolves to
pub fn host_addresses() -> Vec<IpAddr> {
    let mut addresses = vec![
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ];

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());

    match (hostname.as_str(), 0).to_socket_addrs() {
        Ok(resolved) => {
            for addr in resolved {
                if !addresses.contains(&addr.ip()) {
                    addresses.push(addr.ip());
                }
            }
        }
        Err(e) => debug!("Could not resolve hostname {}: {}", hostname, e),
    }

    addresses
}
