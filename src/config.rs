use crate::protocol::COST_INFINITY;
use crate::{Cost, RouterId};
use anyhow::Result;
use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Node configuration: identity, transport and the two protocol timers.
///
/// Also acts as the engine's interface provider, answering which local
/// broadcast addresses an advertisement should be sent to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub router_id: RouterId,
    pub port: u16,
    /// Delay between unconditional re-broadcasts of the own table.
    pub keepalive_interval_ms: u64,
    /// Silence after which a neighbor is declared dead and purged.
    pub inactivity_interval_ms: u64,
    /// Explicit broadcast targets. When empty, local interfaces are
    /// enumerated at each broadcast instead.
    #[serde(default)]
    pub broadcast_addrs: Vec<Ipv4Addr>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router_id: String::new(),
            port: 5000,
            keepalive_interval_ms: 10_000,  // 10 seconds
            inactivity_interval_ms: 30_000, // 30 seconds
            broadcast_addrs: vec![],
        }
    }
}

impl RouterConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn inactivity_interval(&self) -> Duration {
        Duration::from_millis(self.inactivity_interval_ms)
    }

    /// The reserved unreachable sentinel, exposed so callers never hardcode it.
    pub fn cost_infinity(&self) -> Cost {
        COST_INFINITY
    }

    /// Broadcast addresses to advertise on, one per target network.
    ///
    /// The configured list wins when present; otherwise every up,
    /// non-loopback IPv4 interface contributes its broadcast address.
    pub fn broadcast_addresses(&self) -> Vec<Ipv4Addr> {
        if !self.broadcast_addrs.is_empty() {
            return self.broadcast_addrs.clone();
        }

        let mut addrs = Vec::new();
        for iface in datalink::interfaces() {
            if !iface.is_up() || iface.is_loopback() {
                continue;
            }
            for ip in &iface.ips {
                if let IpNetwork::V4(net) = ip {
                    addrs.push(net.broadcast());
                }
            }
        }
        addrs
    }
}
