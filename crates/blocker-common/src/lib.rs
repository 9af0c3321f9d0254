//! Blocker Common - Shared types and configuration
//!
//! This crate provides the data model shared by the storage client and the
//! volume lifecycle core, plus the layered configuration used by every
//! Blocker component.

pub mod config;
pub mod types;

pub use config::{BlockerConfig, ConfigError};
pub use types::*;
