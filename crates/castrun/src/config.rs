//! # Configuration
//!
//! `Config` carries everything a context needs before its first operation. Values
//! start from `Default`, can be overridden from the `CASTRUN_*` environment with
//! `from_env`, and then adjusted with the `with_*` setters.

use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::str::FromStr;
use std::time::Duration;

use castwire::NodeId;
use rand::Rng;

use crate::mux::MuxKind;

pub const ENV_NODE_ID: &str = "CASTRUN_NODE_ID";
pub const ENV_MAX_NODES: &str = "CASTRUN_MAX_NODES";
pub const ENV_MCAST_GROUP_ADDR: &str = "CASTRUN_MCAST_GROUP_ADDR";
pub const ENV_MCAST_GROUP_PORT: &str = "CASTRUN_MCAST_GROUP_PORT";
pub const ENV_MCAST_IFACE_ADDR: &str = "CASTRUN_MCAST_IFACE_ADDR";
pub const ENV_MCAST_TTL: &str = "CASTRUN_MCAST_TTL";
pub const ENV_CONTROL_LISTEN_IFACE: &str = "CASTRUN_CONTROL_LISTEN_IFACE";
pub const ENV_CONTROL_LISTEN_PORT: &str = "CASTRUN_CONTROL_LISTEN_PORT";
pub const ENV_LOG_LEVEL: &str = "CASTRUN_LOG_LEVEL";

pub const DEFAULT_MAX_NODES: usize = 32;
pub const DEFAULT_MCAST_GROUP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 40, 41, 42);
pub const DEFAULT_MCAST_GROUP_PORT: u16 = 4723;
pub const DEFAULT_MCAST_TTL: u8 = 1;
pub const DEFAULT_LOG_LEVEL: u8 = 2;
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;
pub const DEFAULT_SUSPEND_THRESHOLD: usize = 3000;
pub const DEFAULT_RESTART_THRESHOLD: usize = 2800;
pub const DEFAULT_SYMTAB_SIZE: usize = 128;
/// 63 KiB, leaving headroom under the 64 KiB datagram limit for transport headers.
pub const DEFAULT_MAX_PAYLOAD: usize = 64512;
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_millis(200);

/// Settings of one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Zero means "pick a random id at initialization".
    pub node_id: NodeId,
    pub max_nodes: usize,
    pub mcast_group_addr: Ipv4Addr,
    pub mcast_group_port: u16,
    pub mcast_iface_addr: Ipv4Addr,
    pub mcast_ttl: u8,
    pub control_listen_iface: Ipv4Addr,
    /// Zero picks an ephemeral port.
    pub control_listen_port: u16,
    /// 0 (none) through 6 (trace). See `logging::init`.
    pub log_level: u8,
    pub max_connections: usize,
    /// Unacknowledged packet count at which the publisher reports congestion.
    pub suspend_threshold: usize,
    /// Count the publisher must drain below before accepting packets again.
    pub restart_threshold: usize,
    /// Capacity of every registry table.
    pub symtab_size: usize,
    /// Capacity of the outbound buffer, and so the largest packet handed off.
    pub max_payload: usize,
    pub announce_interval: Duration,
    pub mux: MuxKind,
    /// An epoll descriptor owned by the application to register into instead of
    /// creating one. Only meaningful with `MuxKind::Epoll`.
    pub external_epoll_fd: Option<RawFd>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: NodeId(0),
            max_nodes: DEFAULT_MAX_NODES,
            mcast_group_addr: DEFAULT_MCAST_GROUP_ADDR,
            mcast_group_port: DEFAULT_MCAST_GROUP_PORT,
            mcast_iface_addr: Ipv4Addr::UNSPECIFIED,
            mcast_ttl: DEFAULT_MCAST_TTL,
            control_listen_iface: Ipv4Addr::UNSPECIFIED,
            control_listen_port: 0,
            log_level: DEFAULT_LOG_LEVEL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            suspend_threshold: DEFAULT_SUSPEND_THRESHOLD,
            restart_threshold: DEFAULT_RESTART_THRESHOLD,
            symtab_size: DEFAULT_SYMTAB_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
            announce_interval: DEFAULT_ANNOUNCE_INTERVAL,
            mux: MuxKind::default(),
            external_epoll_fd: None,
        }
    }
}

impl Config {
    /// Defaults overridden by whatever `CASTRUN_*` variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            node_id: NodeId(parse_var(&lookup, ENV_NODE_ID, d.node_id.0, parse_node_id)),
            max_nodes: parse_var(&lookup, ENV_MAX_NODES, d.max_nodes, usize::from_str),
            mcast_group_addr: parse_var(&lookup, ENV_MCAST_GROUP_ADDR, d.mcast_group_addr, Ipv4Addr::from_str),
            mcast_group_port: parse_var(&lookup, ENV_MCAST_GROUP_PORT, d.mcast_group_port, u16::from_str),
            mcast_iface_addr: parse_var(&lookup, ENV_MCAST_IFACE_ADDR, d.mcast_iface_addr, Ipv4Addr::from_str),
            mcast_ttl: parse_var(&lookup, ENV_MCAST_TTL, d.mcast_ttl, u8::from_str),
            control_listen_iface: parse_var(&lookup, ENV_CONTROL_LISTEN_IFACE, d.control_listen_iface, Ipv4Addr::from_str),
            control_listen_port: parse_var(&lookup, ENV_CONTROL_LISTEN_PORT, d.control_listen_port, u16::from_str),
            log_level: parse_var(&lookup, ENV_LOG_LEVEL, d.log_level, parse_log_level),
            ..d
        }
    }

    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_mcast_group(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.mcast_group_addr = addr;
        self.mcast_group_port = port;
        self
    }

    pub fn with_mcast_iface(mut self, addr: Ipv4Addr) -> Self {
        self.mcast_iface_addr = addr;
        self
    }

    pub fn with_mcast_ttl(mut self, ttl: u8) -> Self {
        self.mcast_ttl = ttl;
        self
    }

    pub fn with_control_listen(mut self, iface: Ipv4Addr, port: u16) -> Self {
        self.control_listen_iface = iface;
        self.control_listen_port = port;
        self
    }

    pub fn with_log_level(mut self, level: u8) -> Self {
        self.log_level = level.min(6);
        self
    }

    pub fn with_symtab_size(mut self, size: usize) -> Self {
        self.symtab_size = size;
        self
    }

    pub fn with_max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes;
        self
    }

    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.announce_interval = interval;
        self
    }

    pub fn with_congestion_thresholds(mut self, suspend: usize, restart: usize) -> Self {
        self.suspend_threshold = suspend;
        self.restart_threshold = restart;
        self
    }

    pub fn with_mux(mut self, mux: MuxKind) -> Self {
        self.mux = mux;
        self
    }

    /// Registers into an application-owned epoll descriptor. Selects `MuxKind::Epoll`.
    pub fn with_external_epoll_fd(mut self, fd: RawFd) -> Self {
        self.external_epoll_fd = Some(fd);
        self.mux = MuxKind::Epoll;
        self
    }

    /// The configured node id, or a random non-zero one when unset.
    pub fn resolve_node_id(&self) -> NodeId {
        if self.node_id.0 != 0 {
            return self.node_id;
        }
        NodeId(rand::thread_rng().gen_range(1..=u32::MAX))
    }

    /// The subset of settings handed to the transport factory.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            max_nodes: self.max_nodes,
            mcast_group_addr: self.mcast_group_addr,
            mcast_group_port: self.mcast_group_port,
            mcast_iface_addr: self.mcast_iface_addr,
            mcast_ttl: self.mcast_ttl,
            control_listen_iface: self.control_listen_iface,
            control_listen_port: self.control_listen_port,
            max_connections: self.max_connections,
            suspend_threshold: self.suspend_threshold,
            restart_threshold: self.restart_threshold,
        }
    }
}

/// Transport-facing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub max_nodes: usize,
    pub mcast_group_addr: Ipv4Addr,
    pub mcast_group_port: u16,
    pub mcast_iface_addr: Ipv4Addr,
    pub mcast_ttl: u8,
    pub control_listen_iface: Ipv4Addr,
    pub control_listen_port: u16,
    pub max_connections: usize,
    pub suspend_threshold: usize,
    pub restart_threshold: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Config::default().transport_settings()
    }
}

fn parse_var<T, E>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Result<T, E>,
) -> T
where
    E: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match parse(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring unparseable setting");
            default
        }
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_node_id(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn parse_log_level(s: &str) -> Result<u8, String> {
    match s.parse::<u8>() {
        Ok(level) if level <= 6 => Ok(level),
        Ok(level) => Err(format!("log level {} is out of range 0..=6", level)),
        Err(e) => Err(e.to_string()),
    }
}
