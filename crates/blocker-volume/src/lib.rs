#![allow(clippy::result_large_err)]
//! Blocker Volume Lifecycle
//!
//! Turns a remote block-storage volume name into a locally mounted
//! directory and back. The remote service attaches and detaches
//! asynchronously; the local host hands out device names from a small
//! shared pool; `mount` and `umount` can fail independently of both.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ VolumeRegistry  │  create / mount / path / unmount / remove
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Mounter      │  mountpoints, mount(8) / umount(8)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Attacher     │  wait available → claim slot → wait attached
//! │ - Allocator     │
//! │ - StatePoller   │
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ Storage service │  (BlockStorageClient)
//! └─────────────────┘
//! ```

pub mod allocator;
pub mod attach;
pub mod driver;
pub mod error;
pub mod host;
pub mod mount;
pub mod poller;
pub mod registry;

#[cfg(test)]
mod testing;

pub use allocator::{DeviceAllocator, DevicePool, DeviceSlot, SlotOccupancy};
pub use attach::Attacher;
pub use driver::VolumeDriverBuilder;
pub use error::{VolumeError, VolumeResult};
pub use host::{CommandOutput, CommandRunner, DeviceProbe, SystemCommandRunner, SystemDeviceProbe};
pub use mount::Mounter;
pub use poller::{PollPolicy, StatePoller};
pub use registry::VolumeRegistry;
