//! Core data structures.
//!
//! - Target ABI identifiers
//! - The on-disk release layout derived from the configuration

pub mod abi;
pub mod layout;

pub use abi::AndroidAbi;
pub use layout::{BuildDirectory, ExtractionTree, ReleaseArtifact, ReleaseLayout};
