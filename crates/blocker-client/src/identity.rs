//! Host identity discovery

use async_trait::async_trait;
use blocker_common::HostIdentity;
use blocker_common::config::HostConfig;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Supplies the identity of the host at startup
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve instance ID, region and availability zone
    async fn identity(&self) -> ClientResult<HostIdentity>;
}

/// Identity fixed at construction, typically from configuration
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    identity: HostIdentity,
}

impl StaticIdentity {
    /// Create a provider that always returns `identity`
    pub const fn new(identity: HostIdentity) -> Self {
        Self { identity }
    }

    /// Build from the `[host]` configuration section
    ///
    /// Every field is required; a missing one is an identity error.
    pub fn from_config(config: &HostConfig) -> ClientResult<Self> {
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ClientError::Identity(format!("host.{name} is not configured")))
        };

        let identity = HostIdentity {
            instance_id: field(&config.instance_id, "instance_id")?,
            region: field(&config.region, "region")?,
            availability_zone: field(&config.availability_zone, "availability_zone")?,
        };
        debug!(instance_id = %identity.instance_id, "using static host identity");
        Ok(Self::new(identity))
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn identity(&self) -> ClientResult<HostIdentity> {
        Ok(self.identity.clone())
    }
}
