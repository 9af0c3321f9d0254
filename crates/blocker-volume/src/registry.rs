//! Volume registry
//!
//! The authoritative map from volume name to local mount state, and the
//! entry point for every lifecycle operation. A name is either unmounted
//! (no mountpoint) or mounted; in-flight transitions exist only while an
//! operation holds the name's lock.
//!
//! Each name has its own async lock, held for the whole transition, so
//! concurrent calls on one name serialize while different names proceed
//! independently. The map lock is never held across an await.
//!
//! The registry lives in memory only. After a restart volumes may still be
//! attached and mounted with no record of them here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{VolumeError, VolumeResult};
use crate::mount::Mounter;

#[derive(Debug, Default)]
struct Entry {
    mountpoint: Option<PathBuf>,
    /// Set by `remove` before the entry leaves the map, so operations that
    /// looked the entry up earlier see it as gone.
    removed: bool,
}

type Slot = Arc<AsyncMutex<Entry>>;

/// Named volume registry for this host
pub struct VolumeRegistry {
    volumes: Mutex<HashMap<String, Slot>>,
    mounter: Mounter,
}

impl VolumeRegistry {
    /// Create an empty registry
    pub fn new(mounter: Mounter) -> Self {
        Self {
            volumes: Mutex::new(HashMap::new()),
            mounter,
        }
    }

    /// Register `name` as unmounted.
    ///
    /// Re-creating an unmounted name is accepted; a mounted one is
    /// [`VolumeError::AlreadyInUse`].
    pub async fn create(&self, name: &str) -> VolumeResult<()> {
        loop {
            let slot = {
                let mut volumes = self.volumes.lock();
                match volumes.get(name) {
                    Some(slot) => Arc::clone(slot),
                    None => {
                        volumes.insert(name.to_string(), Slot::default());
                        debug!(name, "registered volume");
                        return Ok(());
                    }
                }
            };

            let entry = slot.lock().await;
            if entry.removed {
                // Lost a race with remove; the map no longer holds this slot
                continue;
            }
            if entry.mountpoint.is_some() {
                return Err(VolumeError::AlreadyInUse(name.to_string()));
            }
            debug!(name, "re-registered unmounted volume");
            return Ok(());
        }
    }

    /// Attach and mount `name`, returning its mountpoint
    pub async fn mount(&self, name: &str) -> VolumeResult<PathBuf> {
        let mut entry = self.lock(name).await?;
        if let Some(path) = &entry.mountpoint {
            return Err(VolumeError::AlreadyMounted {
                name: name.to_string(),
                path: path.clone(),
            });
        }

        let path = self.mounter.mount(name).await?;
        entry.mountpoint = Some(path.clone());
        Ok(path)
    }

    /// Mountpoint of `name`
    pub async fn path(&self, name: &str) -> VolumeResult<PathBuf> {
        let entry = self.lock(name).await?;
        entry
            .mountpoint
            .clone()
            .ok_or_else(|| VolumeError::NotMounted(name.to_string()))
    }

    /// Unmount and detach `name`; a no-op if it is not mounted
    pub async fn unmount(&self, name: &str) -> VolumeResult<()> {
        let mut entry = self.lock(name).await?;
        self.unmount_entry(name, &mut entry).await
    }

    /// Unmount `name` if needed, then forget it.
    ///
    /// If the unmount fails the entry stays registered as mounted.
    pub async fn remove(&self, name: &str) -> VolumeResult<()> {
        let slot = self.slot(name)?;
        let mut entry = Arc::clone(&slot).lock_owned().await;
        if entry.removed {
            return Err(VolumeError::NotFound(name.to_string()));
        }

        self.unmount_entry(name, &mut entry).await?;

        entry.removed = true;
        let mut volumes = self.volumes.lock();
        if volumes.get(name).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
            volumes.remove(name);
        }
        info!(name, "removed volume");
        Ok(())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.volumes.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// The mount orchestrator behind this registry
    pub const fn mounter(&self) -> &Mounter {
        &self.mounter
    }

    async fn unmount_entry(&self, name: &str, entry: &mut Entry) -> VolumeResult<()> {
        let Some(mountpoint) = entry.mountpoint.clone() else {
            return Ok(());
        };
        self.mounter.unmount(name, &mountpoint).await?;
        entry.mountpoint = None;
        Ok(())
    }

    fn slot(&self, name: &str) -> VolumeResult<Slot> {
        self.volumes
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    async fn lock(&self, name: &str) -> VolumeResult<OwnedMutexGuard<Entry>> {
        let entry = self.slot(name)?.lock_owned().await;
        if entry.removed {
            return Err(VolumeError::NotFound(name.to_string()));
        }
        Ok(entry)
    }
}
