//! Android SDK and NDK path resolution.
//!
//! Everything here is derived from the SDK root. Versioned components
//! (`ndk/<version>`, `build-tools/<version>`, `cmake/<version>`) are
//! discovered by reading the component directory and picking the highest
//! version present. Nothing is executed.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;

use crate::core::abi::AndroidAbi;
use crate::util::config::Config;

/// Errors raised while locating SDK components.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("no Android SDK at `{}`", .0.display())]
    NoSdk(PathBuf),

    #[error("Android SDK component `{component}` not found at `{}`", .path.display())]
    MissingComponent {
        component: &'static str,
        path: PathBuf,
    },

    #[error("no installed version of `{component}` under `{}`", .dir.display())]
    NoVersions {
        component: &'static str,
        dir: PathBuf,
    },

    #[error("failed to read `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolved locations inside an Android SDK installation.
#[derive(Debug, Clone)]
pub struct AndroidSdk {
    home: PathBuf,
    ndk: PathBuf,
    build_tools: PathBuf,
    cmake: PathBuf,
}

impl AndroidSdk {
    /// Locate the SDK for a configuration.
    pub fn discover(config: &Config) -> Result<Self, SdkError> {
        let root = sdk_root(config, |var| std::env::var_os(var).map(PathBuf::from))?;
        Self::from_root(&root)
    }

    /// Resolve components from a known SDK root.
    pub fn from_root(home: &Path) -> Result<Self, SdkError> {
        if !home.is_dir() {
            return Err(SdkError::NoSdk(home.to_path_buf()));
        }

        let ndk = latest_version_dir(&home.join("ndk"), "ndk")?;
        let build_tools = latest_version_dir(&home.join("build-tools"), "build-tools")?;
        let cmake = latest_version_dir(&home.join("cmake"), "cmake")?;

        tracing::debug!("ndk: {}", ndk.display());
        tracing::debug!("build-tools: {}", build_tools.display());
        tracing::debug!("cmake: {}", cmake.display());

        Ok(AndroidSdk {
            home: home.to_path_buf(),
            ndk,
            build_tools,
            cmake,
        })
    }

    /// Selected NDK directory.
    pub fn ndk(&self) -> &Path {
        &self.ndk
    }

    /// Selected build-tools directory.
    pub fn build_tools(&self) -> &Path {
        &self.build_tools
    }

    /// SDK-bundled CMake binary.
    pub fn cmake(&self) -> PathBuf {
        self.cmake.join("bin").join(exe("cmake"))
    }

    /// SDK-bundled Ninja binary.
    pub fn ninja(&self) -> PathBuf {
        self.cmake.join("bin").join(exe("ninja"))
    }

    /// NDK CMake toolchain file.
    pub fn toolchain_file(&self) -> PathBuf {
        self.ndk.join("build/cmake/android.toolchain.cmake")
    }

    pub fn zipalign(&self) -> PathBuf {
        self.build_tools.join(exe("zipalign"))
    }

    pub fn apksigner(&self) -> PathBuf {
        if cfg!(windows) {
            self.build_tools.join("apksigner.bat")
        } else {
            self.build_tools.join("apksigner")
        }
    }

    pub fn adb(&self) -> PathBuf {
        self.home.join("platform-tools").join(exe("adb"))
    }

    /// Prebuilt C++ runtime library for an ABI, e.g.
    /// `<ndk>/toolchains/llvm/prebuilt/linux-x86_64/sysroot/usr/lib/aarch64-linux-android/libc++_shared.so`.
    pub fn cxx_runtime(&self, abi: AndroidAbi, stl: &str) -> PathBuf {
        self.ndk
            .join("toolchains/llvm/prebuilt")
            .join(host_tag())
            .join("sysroot/usr/lib")
            .join(abi.sysroot_triple())
            .join(format!("lib{}.so", stl))
    }
}

/// NDK prebuilt host directory name.
pub fn host_tag() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows-x86_64",
        "macos" => "darwin-x86_64",
        _ => "linux-x86_64",
    }
}

fn exe(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

/// Pick the SDK root: the configured path, then `ANDROID_HOME`, then
/// `ANDROID_SDK_ROOT`, then the platform default location.
pub fn sdk_root(
    config: &Config,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> Result<PathBuf, SdkError> {
    if let Some(ref path) = config.android_sdk {
        return Ok(path.clone());
    }

    for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        if let Some(path) = lookup(var).filter(|p| !p.as_os_str().is_empty()) {
            return Ok(path);
        }
    }

    default_sdk_root().ok_or_else(|| SdkError::NoSdk(PathBuf::from("~/Android/Sdk")))
}

fn default_sdk_root() -> Option<PathBuf> {
    let dirs = directories::BaseDirs::new()?;
    let root = match std::env::consts::OS {
        "windows" => dirs.data_local_dir().join("Android").join("Sdk"),
        "macos" => dirs.home_dir().join("Library/Android/sdk"),
        _ => dirs.home_dir().join("Android/Sdk"),
    };
    Some(root)
}

/// Return the subdirectory of `dir` with the highest version name.
///
/// Names that parse as semantic versions order by version and rank above
/// names that don't; the rest order lexicographically.
pub fn latest_version_dir(dir: &Path, component: &'static str) -> Result<PathBuf, SdkError> {
    if !dir.is_dir() {
        return Err(SdkError::MissingComponent {
            component,
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| SdkError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SdkError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        // Non-unicode names cannot be compared reasonably.
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }

    names
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
        .map(|name| dir.join(name))
        .ok_or_else(|| SdkError::NoVersions {
            component,
            dir: dir.to_path_buf(),
        })
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
