//! Remote block-storage service interface

use async_trait::async_trait;
use blocker_common::VolumeDescription;

use crate::error::ClientResult;

/// Client for the remote block-storage service
///
/// Attach and detach requests only start an asynchronous transition on the
/// provider side; callers observe completion through [`describe_volume`].
///
/// [`describe_volume`]: BlockStorageClient::describe_volume
#[async_trait]
pub trait BlockStorageClient: Send + Sync {
    /// Fetch the current state and attachment records of a volume
    async fn describe_volume(&self, volume_id: &str) -> ClientResult<VolumeDescription>;

    /// Request that a volume be attached to an instance under `device`
    async fn attach_volume(
        &self,
        volume_id: &str,
        device: &str,
        instance_id: &str,
    ) -> ClientResult<()>;

    /// Request that a volume be detached from an instance
    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> ClientResult<()>;
}
