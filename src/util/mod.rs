//! Shared utilities

pub mod config;
pub mod context;
pub mod fs;
pub mod hash;
pub mod process;

pub use config::{Config, ConfigError, SigningIdentity, VerifyPolicy};
pub use context::GlobalContext;
