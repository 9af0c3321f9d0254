//! Core types for Blocker
//!
//! These mirror what the remote block-storage service reports about a
//! volume and what the host identity provider reports about this machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-side volume state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeState {
    /// Volume is being created
    Creating,
    /// Volume exists and is not attached anywhere
    Available,
    /// Volume is attached to an instance
    InUse,
    /// Volume is being deleted
    Deleting,
    /// Volume has been deleted
    Deleted,
    /// Volume is in an error state
    Error,
}

impl VolumeState {
    /// Wire name used by the storage service
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single volume attachment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentState {
    Attaching,
    Attached,
    Detaching,
    Detached,
    Busy,
}

impl AttachmentState {
    /// Wire name used by the storage service
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
            Self::Detached => "detached",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attachment of a volume to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    /// Attachment state
    pub state: AttachmentState,
    /// Device name requested at attach time (e.g., /dev/sdf)
    pub device: Option<String>,
    /// Instance the volume is attached to
    pub instance_id: Option<String>,
}

impl VolumeAttachment {
    /// Create an attachment record with only a state
    pub const fn new(state: AttachmentState) -> Self {
        Self {
            state,
            device: None,
            instance_id: None,
        }
    }
}

/// Snapshot of a remote volume as returned by a describe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDescription {
    /// Remote volume identifier
    pub volume_id: String,
    /// Volume state
    pub state: VolumeState,
    /// Attachment records
    pub attachments: Vec<VolumeAttachment>,
}

impl VolumeDescription {
    /// Create a description with no attachments
    pub fn new(volume_id: impl Into<String>, state: VolumeState) -> Self {
        Self {
            volume_id: volume_id.into(),
            state,
            attachments: Vec::new(),
        }
    }

    /// Add an attachment record
    #[must_use]
    pub fn with_attachment(mut self, attachment: VolumeAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Identity of the compute host this process runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    /// Instance identifier used in attach/detach requests
    pub instance_id: String,
    /// Region name (e.g., "us-east-1")
    pub region: String,
    /// Availability zone (e.g., "us-east-1a")
    pub availability_zone: String,
}
