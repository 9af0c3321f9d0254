//! Startup wiring
//!
//! Resolves the host identity and assembles poller, allocator, attacher
//! and mounter into a ready [`VolumeRegistry`].

use std::sync::Arc;

use blocker_client::{BlockStorageClient, IdentityProvider};
use blocker_common::BlockerConfig;
use tracing::info;

use crate::allocator::{DeviceAllocator, DevicePool};
use crate::attach::Attacher;
use crate::error::VolumeResult;
use crate::host::{CommandRunner, DeviceProbe, SystemCommandRunner, SystemDeviceProbe};
use crate::mount::Mounter;
use crate::poller::{PollPolicy, StatePoller};
use crate::registry::VolumeRegistry;

/// Builds a [`VolumeRegistry`] from configuration and collaborators
pub struct VolumeDriverBuilder {
    config: BlockerConfig,
    client: Arc<dyn BlockStorageClient>,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn DeviceProbe>,
}

impl VolumeDriverBuilder {
    /// Start from `config` and a storage client, using the real OS
    pub fn new(config: BlockerConfig, client: Arc<dyn BlockStorageClient>) -> Self {
        Self {
            config,
            client,
            runner: Arc::new(SystemCommandRunner),
            probe: Arc::new(SystemDeviceProbe),
        }
    }

    /// Replace the command runner
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the device probe
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn DeviceProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Resolve the host identity and build the registry.
    ///
    /// Identity failures are fatal: no registry is returned.
    pub async fn build(self, identity: &dyn IdentityProvider) -> VolumeResult<VolumeRegistry> {
        let host = identity.identity().await?;
        info!(
            instance_id = %host.instance_id,
            region = %host.region,
            availability_zone = %host.availability_zone,
            "detected host identity"
        );

        let poller = StatePoller::new(
            Arc::clone(&self.client),
            PollPolicy::from(&self.config.poll),
        );
        let allocator = DeviceAllocator::new(
            DevicePool::from(&self.config.devices),
            self.probe,
            Arc::clone(&self.client),
        );
        let attacher = Attacher::new(self.client, host.instance_id, poller, allocator);
        let mounter = Mounter::new(attacher, self.runner, self.config.mount);

        Ok(VolumeRegistry::new(mounter))
    }
}
