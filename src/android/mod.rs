//! Android SDK access: tool resolution and the device bridge.

pub mod adb;
pub mod sdk;

pub use adb::DeviceBridge;
pub use sdk::{AndroidSdk, SdkError};
