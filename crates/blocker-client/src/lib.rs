//! Blocker Client - Remote collaborators
//!
//! This crate defines the interfaces Blocker consumes from the outside
//! world: the remote block-storage API that attaches and detaches volumes,
//! and the provider of this host's identity. Constructing and
//! authenticating a concrete API client is left to the embedder.

pub mod error;
pub mod identity;
pub mod storage;

pub use error::{ClientError, ClientResult};
pub use identity::{IdentityProvider, StaticIdentity};
pub use storage::BlockStorageClient;
