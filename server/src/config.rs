//! Server configuration.

use crate::error::ConfigError;
use std::time::Duration;

/// Timers that drive session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// How long a session may have no connected player before it is
    /// abandoned. A disconnected player can reclaim their slot within it.
    pub grace_period: Duration,
    /// How long a finished game stays rejoinable (for the final snapshot)
    /// before it is retired.
    pub finished_retention: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(60),
            finished_retention: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Maximum number of simultaneously open connections.
    pub max_connections: usize,
    /// Period of the reaper task that abandons and retires sessions.
    pub reap_interval: Duration,
    pub policy: SessionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_connections: 256,
            reap_interval: Duration::from_secs(1),
            policy: SessionPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections < 2 {
            return Err(ConfigError::TooFewConnections);
        }
        if self.reap_interval.is_zero() {
            return Err(ConfigError::ZeroReapInterval);
        }
        Ok(())
    }
}
