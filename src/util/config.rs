//! Pipeline configuration.
//!
//! The configuration is a small record loaded once at startup, by default
//! from `env.json` in the current directory. A `.toml` file is accepted too.
//! Keys follow the historical `env.json` layout:
//!
//! ```json
//! {
//!     "install_dir": "out",
//!     "build_basedir": "build/coop",
//!     "enable_debug": false,
//!     "baseapk_file": "base/gtasa.apk",
//!     "apktool_program": "tools/apktool.jar",
//!     "android_keypath_env": "ANDROID_KEYSTORE",
//!     "android_keyalias_env": "ANDROID_KEYALIAS",
//!     "android_keypass_env": "ANDROID_KEYPASS"
//! }
//! ```
//!
//! The three `android_*_env` keys name environment variables; their values
//! are read when the signing identity is resolved.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::abi::AndroidAbi;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "env.json";

/// Configuration errors. All of them are fatal before any stage runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration `{}`: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("environment variable `{var}` (named by `{key}`) is not set")]
    MissingEnv { key: &'static str, var: String },
}

/// What to do with the signature verifier's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    /// A failed verification fails the run and no release is produced.
    #[default]
    Enforce,
    /// A failed verification is logged and the release is kept.
    Advisory,
    /// The verifier is not invoked.
    Skip,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory receiving installed native libraries and the release APK
    pub install_dir: PathBuf,

    /// Base path of the build directory; the flavour suffix is appended
    #[serde(rename = "build_basedir")]
    pub build_base: PathBuf,

    /// Build the debug flavour
    #[serde(rename = "enable_debug", default)]
    pub debug: bool,

    /// Baseline APK that gets decompiled and patched
    #[serde(rename = "baseapk_file")]
    pub base_apk: PathBuf,

    /// apktool jar
    #[serde(rename = "apktool_program")]
    pub apktool: PathBuf,

    /// Environment variable holding the keystore path
    #[serde(rename = "android_keypath_env")]
    pub keystore_env: String,

    /// Environment variable holding the key alias
    #[serde(rename = "android_keyalias_env")]
    pub key_alias_env: String,

    /// Environment variable holding the key passphrase
    #[serde(rename = "android_keypass_env")]
    pub key_pass_env: String,

    /// Android SDK root (falls back to ANDROID_HOME and the platform default)
    #[serde(default)]
    pub android_sdk: Option<PathBuf>,

    /// CMake project root (defaults to the current directory)
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Shared library base name, also the release file prefix
    #[serde(default = "default_lib_name")]
    pub lib_name: String,

    /// Version string embedded in the release file name
    #[serde(default = "default_version")]
    pub version: String,

    /// The single ABI kept in the release
    #[serde(default = "default_target_abi")]
    pub target_abi: AndroidAbi,

    #[serde(default = "default_min_sdk")]
    pub min_sdk: u32,

    #[serde(default = "default_max_sdk")]
    pub max_sdk: u32,

    /// NDK C++ runtime model
    #[serde(default = "default_stl")]
    pub stl: String,

    /// Name of the extraction tree directory under `install_dir`
    #[serde(default = "default_extract_dir_name")]
    pub extract_dir_name: String,

    /// Patch artifact injected into the extraction tree
    #[serde(default = "default_patch_file")]
    pub patch_file: PathBuf,

    /// Tree-relative path overwritten by the patch artifact
    #[serde(default = "default_patch_target")]
    pub patch_target: PathBuf,

    #[serde(default = "default_java_program")]
    pub java_program: PathBuf,

    /// Filter specs passed to `adb logcat`
    #[serde(default)]
    pub logcat_filters: Option<Vec<String>>,

    #[serde(default)]
    pub verify_policy: VerifyPolicy,
}

fn default_lib_name() -> String {
    "coop".to_string()
}

fn default_version() -> String {
    "0.104".to_string()
}

fn default_target_abi() -> AndroidAbi {
    AndroidAbi::Arm64V8a
}

fn default_min_sdk() -> u32 {
    31
}

fn default_max_sdk() -> u32 {
    33
}

fn default_stl() -> String {
    "c++_shared".to_string()
}

fn default_extract_dir_name() -> String {
    "gtasa-dir".to_string()
}

fn default_patch_file() -> PathBuf {
    PathBuf::from("smali/GTASA.smali")
}

fn default_patch_target() -> PathBuf {
    PathBuf::from("smali/com/rockstargames/gtasa/GTASA.smali")
}

fn default_java_program() -> PathBuf {
    PathBuf::from("java")
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// Relative paths inside the file are resolved against the directory
    /// that contains it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let mut config = if is_toml {
            Self::from_toml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
        .map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;

        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, String> {
        serde_json::from_str(s).map_err(|e| e.to_string())
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        toml::from_str(s).map_err(|e| e.to_string())
    }

    /// Make every relative path absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let base = crate::util::fs::normalize_path(base);
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        anchor(&mut self.install_dir);
        anchor(&mut self.build_base);
        anchor(&mut self.base_apk);
        anchor(&mut self.apktool);
        anchor(&mut self.patch_file);
        if let Some(ref mut sdk) = self.android_sdk {
            anchor(sdk);
        }
        if let Some(ref mut project) = self.project_dir {
            anchor(project);
        }
        // `java` stays a bare program name so it can be looked up on PATH.
        if self.java_program.components().count() > 1 {
            anchor(&mut self.java_program);
        }
    }

    /// Check field values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("lib_name", &self.lib_name),
            ("version", &self.version),
            ("extract_dir_name", &self.extract_dir_name),
            ("android_keypath_env", &self.keystore_env),
            ("android_keyalias_env", &self.key_alias_env),
            ("android_keypass_env", &self.key_pass_env),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("`{}` must not be empty", key)));
            }
        }

        let is_path = |s: &str| s.contains(|c: char| c == '/' || c == '\\');
        if is_path(&self.lib_name) || is_path(&self.extract_dir_name) {
            return Err(ConfigError::Invalid(
                "`lib_name` and `extract_dir_name` must be plain names, not paths".to_string(),
            ));
        }

        if self.min_sdk > self.max_sdk {
            return Err(ConfigError::Invalid(format!(
                "`min_sdk` ({}) is greater than `max_sdk` ({})",
                self.min_sdk, self.max_sdk
            )));
        }

        if !self.patch_target.is_relative() {
            return Err(ConfigError::Invalid(format!(
                "`patch_target` must be relative to the extraction tree, got {}",
                self.patch_target.display()
            )));
        }

        Ok(())
    }

    /// Build flavour name as passed to `CMAKE_BUILD_TYPE`.
    pub fn build_type(&self) -> &'static str {
        if self.debug {
            "Debug"
        } else {
            "Release"
        }
    }

    /// Filter specs for `adb logcat`.
    pub fn logcat_filters(&self) -> Vec<String> {
        self.logcat_filters.clone().unwrap_or_else(|| {
            vec![
                format!("{}:V", self.lib_name),
                "stargames.gtasa:V".to_string(),
                "*:S".to_string(),
            ]
        })
    }

    /// Resolve the signing identity from the environment variables this
    /// configuration names.
    pub fn signing_identity(&self) -> Result<SigningIdentity, ConfigError> {
        self.signing_identity_with(|var| std::env::var(var).ok())
    }

    /// Like [`Config::signing_identity`], with a custom variable lookup.
    pub fn signing_identity_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<SigningIdentity, ConfigError> {
        let fetch = |key: &'static str, var: &str| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv {
                    key,
                    var: var.to_string(),
                })
        };

        let keystore = fetch("android_keypath_env", &self.keystore_env)?;
        let key_alias = fetch("android_keyalias_env", &self.key_alias_env)?;
        fetch("android_keypass_env", &self.key_pass_env)?;

        Ok(SigningIdentity {
            keystore: PathBuf::from(keystore.replace('\\', "/")),
            key_alias,
            pass_env: self.key_pass_env.clone(),
        })
    }
}

/// Keystore, alias and passphrase source for `apksigner`.
///
/// The passphrase itself is never held; `apksigner` reads it from the
/// environment variable through its `env:` password source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    pub keystore: PathBuf,
    pub key_alias: String,
    pub pass_env: String,
}

impl SigningIdentity {
    /// Value for `apksigner --ks-pass`.
    pub fn pass_source(&self) -> String {
        format!("env:{}", self.pass_env)
    }
}
