//! Native library build.
//!
//! The library is an external CMake project; this module configures it for
//! the NDK and drives its Ninja targets.

pub mod cmake;

pub use cmake::{CMakeBuilder, ConfigureOutcome};
