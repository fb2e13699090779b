//! Connectivity probing, used to tell an isolated failure from a lost network.

use std::time::Duration;

use async_trait::async_trait;

/// Answers whether the network is currently reachable.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probes connectivity by resolving a well-known host.
#[derive(Debug, Clone)]
pub struct DnsProbe {
    host: String,
    timeout: Duration,
}

impl DnsProbe {
    /// `host` must include a port, e.g. `one.one.one.one:443`.
    #[must_use]
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Connectivity for DnsProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::lookup_host(self.host.as_str())).await
        {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                log::debug!("Resolving {} failed: {e}", self.host);
                false
            }
            Err(_) => {
                log::debug!("Resolving {} timed out", self.host);
                false
            }
        }
    }
}
