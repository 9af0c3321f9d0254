//! Mount/unmount orchestration
//!
//! Each mount gets a fresh directory `<base_dir>/<uuid>`. A failed mount
//! releases the attachment it made; a failed unmount leaves everything in
//! place so the caller can retry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use blocker_common::config::MountConfig;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attach::Attacher;
use crate::error::{VolumeError, VolumeResult};
use crate::host::CommandRunner;

const MOUNT: &str = "mount";
const UMOUNT: &str = "umount";

/// Mounts attached volumes on generated mountpoints
pub struct Mounter {
    attacher: Attacher,
    runner: Arc<dyn CommandRunner>,
    config: MountConfig,
}

impl Mounter {
    /// Create a mounter
    pub fn new(attacher: Attacher, runner: Arc<dyn CommandRunner>, config: MountConfig) -> Self {
        Self {
            attacher,
            runner,
            config,
        }
    }

    /// Underlying attacher
    pub const fn attacher(&self) -> &Attacher {
        &self.attacher
    }

    /// Attach `volume_id` and mount it on a new mountpoint, returning the
    /// mountpoint.
    pub async fn mount(&self, volume_id: &str) -> VolumeResult<PathBuf> {
        let mountpoint = self.config.base_dir.join(Uuid::new_v4().to_string());
        let target = command_arg(&mountpoint)?.to_string();
        self.create_mountpoint(&mountpoint).await?;

        let device = match self.attacher.attach(volume_id).await {
            Ok(device) => device,
            Err(e) => {
                self.discard_mountpoint(&mountpoint).await;
                return Err(e);
            }
        };

        let mut args = Vec::with_capacity(4);
        if let Some(fs_type) = self.config.fs_type.as_deref() {
            args.extend(["-t", fs_type]);
        }
        args.extend([device.as_str(), target.as_str()]);

        let failure = match self.runner.run(MOUNT, &args).await {
            Ok(out) if out.success => None,
            Ok(out) => Some((out.status(), out.output)),
            Err(e) => Some((e.to_string(), String::new())),
        };

        if let Some((status, output)) = failure {
            self.attacher.release(volume_id).await;
            self.discard_mountpoint(&mountpoint).await;
            return Err(VolumeError::MountExec {
                device,
                mountpoint,
                status,
                output,
            });
        }

        info!(volume_id, %device, mountpoint = %mountpoint.display(), "mounted volume");
        Ok(mountpoint)
    }

    /// Unmount `mountpoint`, remove it, then detach `volume_id`.
    ///
    /// Stops at the first failing step. A failure after the unmount
    /// command succeeded leaves the device unmounted while the caller still
    /// records it as mounted; retrying converges.
    pub async fn unmount(&self, volume_id: &str, mountpoint: &Path) -> VolumeResult<()> {
        let target = command_arg(mountpoint)?;
        let out = self
            .runner
            .run(UMOUNT, &[target])
            .await
            .map_err(|e| VolumeError::UnmountExec {
                mountpoint: mountpoint.to_path_buf(),
                status: e.to_string(),
                output: String::new(),
            })?;
        if !out.success {
            return Err(VolumeError::UnmountExec {
                mountpoint: mountpoint.to_path_buf(),
                status: out.status(),
                output: out.output,
            });
        }

        fs::remove_dir(mountpoint)
            .await
            .map_err(|e| VolumeError::mountpoint(mountpoint, e))?;

        self.attacher.detach(volume_id).await?;

        info!(volume_id, mountpoint = %mountpoint.display(), "unmounted volume");
        Ok(())
    }

    async fn create_mountpoint(&self, path: &Path) -> VolumeResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.config.dir_mode);
        builder
            .create(path)
            .await
            .map_err(|e| VolumeError::mountpoint(path, e))?;

        let metadata = fs::metadata(path)
            .await
            .map_err(|e| VolumeError::mountpoint(path, e))?;
        if !metadata.is_dir() {
            return Err(VolumeError::mountpoint(path, "not a directory"));
        }
        Ok(())
    }

    /// Remove an unused mountpoint; it is empty, so failure only leaks a
    /// directory.
    async fn discard_mountpoint(&self, path: &Path) {
        if let Err(e) = fs::remove_dir(path).await {
            warn!(mountpoint = %path.display(), error = %e, "failed to remove unused mountpoint");
        }
    }
}

/// Mountpoint as a command argument; non-UTF-8 paths are refused rather
/// than passed on lossily.
fn command_arg(path: &Path) -> VolumeResult<&str> {
    path.to_str()
        .ok_or_else(|| VolumeError::mountpoint(path, "path is not valid UTF-8"))
}
