//! apkstage - native library build and APK release pipeline for Android
//!
//! This crate cross-compiles a native shared library with the NDK, injects
//! it into a decompiled baseline APK together with a code patch, and
//! repacks, aligns and signs the result. Device helpers wrap `adb`.

pub mod android;
pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for apkstage unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a simulated Android toolchain and a throwaway workspace.
#[cfg(test)]
pub mod test_support;

pub use android::{AndroidSdk, DeviceBridge};
pub use crate::core::abi::AndroidAbi;
pub use crate::core::layout::ReleaseLayout;
pub use ops::{PipelineError, Stage};
pub use util::config::Config;
pub use util::context::GlobalContext;
