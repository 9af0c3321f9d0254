//! Volume lifecycle error types

use blocker_client::ClientError;
use std::path::PathBuf;
use thiserror::Error;

/// Volume lifecycle error
#[derive(Error, Debug)]
pub enum VolumeError {
    /// Name is not registered
    #[error("volume not found: {0}")]
    NotFound(String),

    /// Name is registered and currently mounted, so it cannot be re-created
    #[error("volume name already in use: {0}")]
    AlreadyInUse(String),

    /// Mount requested for a volume that is already mounted
    #[error("volume already mounted: {name} at {}", path.display())]
    AlreadyMounted { name: String, path: PathBuf },

    /// Path requested for a volume that is not mounted
    #[error("volume not mounted: {0}")]
    NotMounted(String),

    /// Mountpoint directory could not be created, checked or removed
    #[error("mountpoint {}: {reason}", path.display())]
    Mountpoint { path: PathBuf, reason: String },

    /// The mount command failed
    #[error("mounting device {device} to {} failed: {status}\n{output}", mountpoint.display())]
    MountExec {
        device: String,
        mountpoint: PathBuf,
        status: String,
        output: String,
    },

    /// The unmount command failed
    #[error("unmounting {} failed: {status}\n{output}", mountpoint.display())]
    UnmountExec {
        mountpoint: PathBuf,
        status: String,
        output: String,
    },

    /// Every device slot was taken locally or remotely
    #[error("no devices available for attach: {prefix}[{letters}] taken")]
    DeviceExhausted { prefix: String, letters: String },

    /// Attach completed remotely but no local device node appeared
    #[error("device {device} is missing after attach (also checked {alt_device})")]
    DeviceMissingAfterAttach { device: String, alt_device: String },

    /// Remote state did not converge within the retry budget
    #[error("volume {volume_id} state transition timed out after {attempts} attempts: {reason}")]
    StateTransitionTimeout {
        volume_id: String,
        attempts: u32,
        reason: String,
    },

    /// Remote API or transport error, passed through unchanged
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl VolumeError {
    /// Create a [`VolumeError::Mountpoint`] from anything displayable
    pub fn mountpoint<E: std::fmt::Display>(path: impl Into<PathBuf>, e: E) -> Self {
        Self::Mountpoint {
            path: path.into(),
            reason: e.to_string(),
        }
    }
}

/// Result type for volume lifecycle operations
pub type VolumeResult<T> = Result<T, VolumeError>;
