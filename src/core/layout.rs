//! On-disk layout of a release.
//!
//! All locations the pipeline reads or writes are derived here from the
//! configuration, so the stages never assemble paths themselves.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::abi::AndroidAbi;
use crate::util::config::Config;

/// Marker written by CMake once the generator has completed.
const CMAKE_CACHE: &str = "CMakeCache.txt";

/// Fingerprint stamp kept inside the extraction tree.
const STAMP_FILE: &str = ".apkstage-stamp";

/// Append a suffix to the final component of a path.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// CMake build directory for one build flavour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirectory {
    path: PathBuf,
}

impl BuildDirectory {
    /// `<base>.rel` or `<base>.dbg`.
    pub fn new(base: &Path, debug: bool) -> Self {
        let suffix = if debug { ".dbg" } else { ".rel" };
        BuildDirectory {
            path: with_suffix(base, suffix),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Whether the generator has written its cache.
    pub fn is_configured(&self) -> bool {
        self.path.join(CMAKE_CACHE).is_file()
    }
}

/// Decompiled baseline package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTree {
    root: PathBuf,
}

impl ExtractionTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ExtractionTree { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    /// Folder holding one subdirectory per ABI.
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn abi_dir(&self, abi: AndroidAbi) -> PathBuf {
        self.lib_dir().join(abi.as_str())
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.root.join(STAMP_FILE)
    }
}

/// The final signed package and its transient predecessors.
///
/// The chain is `<release>.un` (repacked) → `<release>.aligned` →
/// `<release>.signed` (staged signer output) → `<release>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    path: PathBuf,
}

impl ReleaseArtifact {
    /// `<dir>/<lib_name> v<version>.apk`
    pub fn new(dir: &Path, lib_name: &str, version: &str) -> Self {
        ReleaseArtifact {
            path: dir.join(Self::file_name(lib_name, version)),
        }
    }

    pub fn file_name(lib_name: &str, version: &str) -> String {
        format!("{} v{}.apk", lib_name, version)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Repacked, not yet aligned.
    pub fn unaligned(&self) -> PathBuf {
        with_suffix(&self.path, ".un")
    }

    /// Aligned, not yet signed.
    pub fn aligned(&self) -> PathBuf {
        with_suffix(&self.path, ".aligned")
    }

    /// Signed but not yet verified and promoted.
    pub fn staged(&self) -> PathBuf {
        with_suffix(&self.path, ".signed")
    }

    /// Every transient file of the chain.
    pub fn transient_paths(&self) -> [PathBuf; 3] {
        [self.unaligned(), self.aligned(), self.staged()]
    }
}

/// Every location of one configured release.
#[derive(Debug, Clone)]
pub struct ReleaseLayout {
    pub build_dir: BuildDirectory,
    pub install_dir: PathBuf,
    pub extraction_tree: ExtractionTree,
    pub release: ReleaseArtifact,
}

impl ReleaseLayout {
    pub fn from_config(config: &Config) -> Self {
        ReleaseLayout {
            build_dir: BuildDirectory::new(&config.build_base, config.debug),
            install_dir: config.install_dir.clone(),
            extraction_tree: ExtractionTree::new(config.install_dir.join(&config.extract_dir_name)),
            release: ReleaseArtifact::new(&config.install_dir, &config.lib_name, &config.version),
        }
    }

    /// Paths in the install directory that teardown must keep.
    pub fn preserved(&self) -> [&Path; 2] {
        [self.release.path(), self.extraction_tree.root()]
    }
}
