//! Attach/detach orchestration
//!
//! Brings a remote volume to "attached on this host" and back, hiding the
//! storage service's asynchronous transitions behind calls that return once
//! the volume is usable.

use std::sync::Arc;

use blocker_client::BlockStorageClient;
use tracing::{info, warn};

use crate::allocator::DeviceAllocator;
use crate::error::{VolumeError, VolumeResult};
use crate::poller::StatePoller;

/// Attaches and detaches volumes for one host instance
pub struct Attacher {
    client: Arc<dyn BlockStorageClient>,
    instance_id: String,
    poller: StatePoller,
    allocator: DeviceAllocator,
}

impl Attacher {
    /// Create an attacher for `instance_id`
    pub fn new(
        client: Arc<dyn BlockStorageClient>,
        instance_id: impl Into<String>,
        poller: StatePoller,
        allocator: DeviceAllocator,
    ) -> Self {
        Self {
            client,
            instance_id: instance_id.into(),
            poller,
            allocator,
        }
    }

    /// Instance volumes are attached to
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Attach `volume_id` to this host and return its local device path.
    ///
    /// Waits for any in-flight detach to settle first. If the attachment
    /// completes but no local device node appears, the attachment is
    /// released before returning [`VolumeError::DeviceMissingAfterAttach`].
    pub async fn attach(&self, volume_id: &str) -> VolumeResult<String> {
        self.poller.wait_until_available(volume_id).await?;

        let slot = self.allocator.claim(volume_id, &self.instance_id).await?;

        self.poller.wait_until_attached(volume_id).await?;
        info!(
            volume_id,
            instance_id = %self.instance_id,
            device = %slot.device,
            "attached volume"
        );

        match self.allocator.resolve(&slot) {
            Some(device) => Ok(device),
            None => {
                self.release(volume_id).await;
                Err(VolumeError::DeviceMissingAfterAttach {
                    device: slot.device,
                    alt_device: slot.alt_device,
                })
            }
        }
    }

    /// Request detach of `volume_id` from this host.
    ///
    /// Does not wait for the volume to become available again.
    pub async fn detach(&self, volume_id: &str) -> VolumeResult<()> {
        self.client
            .detach_volume(volume_id, &self.instance_id)
            .await?;
        info!(volume_id, instance_id = %self.instance_id, "detached volume");
        Ok(())
    }

    /// Compensating detach after a later step failed.
    ///
    /// Errors are logged and dropped; the caller reports its own failure.
    pub async fn release(&self, volume_id: &str) {
        if let Err(e) = self.detach(volume_id).await {
            warn!(volume_id, error = %e, "compensating detach failed");
        }
    }
}
