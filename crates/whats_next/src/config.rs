use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PORT: u16 = 7654;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub const DEFAULT_HARD_DEADLINE: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

const PORT_ENV: &str = "WHATS_NEXT_PORT";

/// Listener address and timing policy of the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Always a loopback address; the broker has no authentication.
    pub host: IpAddr,
    pub port: u16,
    /// How long a caller waits before receiving the "still thinking" reply.
    pub idle_timeout: Duration,
    /// Upper bound for one request; exceeded requests fail with 408.
    pub hard_deadline: Duration,
    pub queue_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hard_deadline: DEFAULT_HARD_DEADLINE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl BrokerConfig {
    /// Defaults with `WHATS_NEXT_PORT` applied when it holds a valid port.
    pub fn from_env() -> Self {
        let config = Self::default();
        match port_from_env() {
            Some(port) => config.with_port(port),
            None => config,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Applies `port` when given, keeping the current one otherwise.
    pub fn with_port_override(self, port: Option<u16>) -> Self {
        match port {
            Some(port) => self.with_port(port),
            None => self,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_hard_deadline(mut self, hard_deadline: Duration) -> Self {
        self.hard_deadline = hard_deadline;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn port_from_env() -> Option<u16> {
    let raw = env::var(PORT_ENV).ok()?;
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Some(port),
        _ => {
            warn!(value = %raw, "ignoring invalid {PORT_ENV}");
            None
        }
    }
}
