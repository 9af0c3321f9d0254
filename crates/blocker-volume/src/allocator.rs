//! Device slot allocation
//!
//! Secondary volumes are attached under a small, ordered pool of device
//! letters (`/dev/sdf` .. `/dev/sdp` by default). The pool is shared with
//! every other process on the host, so a slot can be free locally and still
//! be refused by the storage service. Such refusals are races, not failures:
//! the allocator moves on to the next letter.
//!
//! ```text
//!  letter ──► local node present? ──yes──► next letter
//!                  │ no
//!                  ▼
//!            attach request ──"device in use"──► next letter
//!                  │ other error ──► fail
//!                  ▼ accepted
//!             claimed slot
//! ```

use std::path::Path;
use std::sync::Arc;

use blocker_client::BlockStorageClient;
use blocker_common::config::DeviceConfig;
use tracing::{debug, info};

use crate::error::{VolumeError, VolumeResult};
use crate::host::DeviceProbe;

/// One device letter with both of its local names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSlot {
    /// Slot letter (e.g., 'f')
    pub letter: char,
    /// Legacy name, also the name sent to the storage service (/dev/sdf)
    pub device: String,
    /// Name the kernel may remap the device to (/dev/xvdf)
    pub alt_device: String,
}

/// Local occupancy of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOccupancy {
    /// Neither name exists
    Free,
    /// The legacy node exists
    Legacy,
    /// Only the remapped node exists
    Remapped,
}

impl SlotOccupancy {
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Ordered set of device slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePool {
    prefix: String,
    remapped_prefix: String,
    letters: Vec<char>,
}

impl DevicePool {
    /// Create a pool from prefixes and an ordered letter list
    pub fn new(
        prefix: impl Into<String>,
        remapped_prefix: impl Into<String>,
        letters: impl IntoIterator<Item = char>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            remapped_prefix: remapped_prefix.into(),
            letters: letters.into_iter().collect(),
        }
    }

    /// Slots in allocation order
    pub fn slots(&self) -> impl Iterator<Item = DeviceSlot> + '_ {
        self.letters.iter().map(|&letter| DeviceSlot {
            letter,
            device: format!("{}{letter}", self.prefix),
            alt_device: format!("{}{letter}", self.remapped_prefix),
        })
    }

    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.letters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Which local name of `slot`, if any, is present
    pub fn occupancy(&self, slot: &DeviceSlot, probe: &dyn DeviceProbe) -> SlotOccupancy {
        if probe.exists(Path::new(&slot.device)) {
            SlotOccupancy::Legacy
        } else if probe.exists(Path::new(&slot.alt_device)) {
            SlotOccupancy::Remapped
        } else {
            SlotOccupancy::Free
        }
    }

    fn exhausted(&self) -> VolumeError {
        VolumeError::DeviceExhausted {
            prefix: self.prefix.clone(),
            letters: self.letters.iter().collect(),
        }
    }
}

impl Default for DevicePool {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for DevicePool {
    fn from(config: &DeviceConfig) -> Self {
        Self::new(
            config.prefix.clone(),
            config.remapped_prefix.clone(),
            config.letters.chars(),
        )
    }
}

/// Claims a device slot for a volume on this host
pub struct DeviceAllocator {
    pool: DevicePool,
    probe: Arc<dyn DeviceProbe>,
    client: Arc<dyn BlockStorageClient>,
}

impl DeviceAllocator {
    /// Create an allocator
    pub fn new(
        pool: DevicePool,
        probe: Arc<dyn DeviceProbe>,
        client: Arc<dyn BlockStorageClient>,
    ) -> Self {
        Self {
            pool,
            probe,
            client,
        }
    }

    /// Issue an attach request for the first slot that is free locally and
    /// accepted by the storage service.
    ///
    /// The returned slot has an accepted attach request; the attachment
    /// itself may still be in progress.
    pub async fn claim(&self, volume_id: &str, instance_id: &str) -> VolumeResult<DeviceSlot> {
        for slot in self.pool.slots() {
            let occupancy = self.pool.occupancy(&slot, self.probe.as_ref());
            if !occupancy.is_free() {
                debug!(device = %slot.device, ?occupancy, "device slot in local use");
                continue;
            }

            match self
                .client
                .attach_volume(volume_id, &slot.device, instance_id)
                .await
            {
                Ok(()) => {
                    info!(volume_id, instance_id, device = %slot.device, "attach requested");
                    return Ok(slot);
                }
                Err(e) if e.is_device_in_use() => {
                    debug!(device = %slot.device, error = %e, "device name taken remotely, trying next slot");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.pool.exhausted())
    }

    /// Local path of an attached slot: the legacy name if present,
    /// otherwise the remapped name.
    pub fn resolve(&self, slot: &DeviceSlot) -> Option<String> {
        match self.pool.occupancy(slot, self.probe.as_ref()) {
            SlotOccupancy::Legacy => Some(slot.device.clone()),
            SlotOccupancy::Remapped => {
                info!(device = %slot.device, local = %slot.alt_device, "device remapped by kernel");
                Some(slot.alt_device.clone())
            }
            SlotOccupancy::Free => None,
        }
    }
}
