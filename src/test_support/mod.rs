//! Test utilities for apkstage unit tests.
//!
//! [`FakeToolchain`] stands in for every external program the pipeline
//! runs. It records each invocation and reproduces the tools' effects on
//! disk (a CMake cache, installed libraries, a decompiled tree, package
//! files) so whole runs can be exercised without an Android SDK.
//!
//! [`PipelineFixture`] lays out a throwaway workspace with a fake SDK,
//! baseline package, patch artifact and configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! let fixture = PipelineFixture::new();
//! let fake = FakeToolchain::new();
//! fake.fail_on("zipalign", 1);
//!
//! let ctx = fixture.context(fake.clone());
//! assert!(assemble(&ctx).is_err());
//! assert_eq!(fake.count_matching("apksigner"), 0);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tempfile::TempDir;

use crate::android::AndroidSdk;
use crate::util::config::{Config, SigningIdentity, VerifyPolicy};
use crate::util::context::GlobalContext;
use crate::util::process::{Executor, ExitInfo, ProcessBuilder};

/// One recorded program run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub cwd: Option<PathBuf>,
}

/// Canned outcome for commands containing `pattern`.
#[derive(Debug)]
struct Override {
    pattern: String,
    /// `None` reports termination by a signal.
    code: Option<i32>,
}

#[derive(Debug)]
struct ToolchainState {
    invocations: Vec<Invocation>,
    overrides: Vec<Override>,
    abis: Vec<String>,
    /// Install directory and library name `ninja install` writes to.
    install: Option<(PathBuf, String)>,
}

/// Simulated Android toolchain.
///
/// Clones share state, so a test can hand one clone to the context and
/// inspect the calls through another.
#[derive(Debug, Clone)]
pub struct FakeToolchain {
    state: Arc<Mutex<ToolchainState>>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolchain {
    /// ABIs present in the decompiled baseline by default.
    pub const DEFAULT_ABIS: [&'static str; 3] = ["armeabi-v7a", "arm64-v8a", "x86_64"];

    pub fn new() -> Self {
        FakeToolchain {
            state: Arc::new(Mutex::new(ToolchainState {
                invocations: Vec::new(),
                overrides: Vec::new(),
                abis: Self::DEFAULT_ABIS.iter().map(|s| s.to_string()).collect(),
                install: None,
            })),
        }
    }

    /// Set the ABI folders the decompiler produces.
    pub fn with_abis(self, abis: &[&str]) -> Self {
        self.lock().abis = abis.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Make every command containing `pattern` exit with `code` and no
    /// side effects.
    pub fn fail_on(&self, pattern: &str, code: i32) {
        self.push_override(pattern, Some(code));
    }

    /// Make matching commands exit 0 without touching the filesystem.
    pub fn silence(&self, pattern: &str) {
        self.push_override(pattern, Some(0));
    }

    /// Make matching commands report termination by a signal.
    pub fn terminate_on(&self, pattern: &str) {
        self.push_override(pattern, None);
    }

    fn push_override(&self, pattern: &str, code: Option<i32>) {
        self.lock().overrides.push(Override {
            pattern: pattern.to_string(),
            code,
        });
    }

    /// Where `ninja install` drops `lib<name>.so`.
    pub fn set_install_target(&self, dir: &Path, lib_name: &str) {
        self.lock().install = Some((dir.to_path_buf(), lib_name.to_string()));
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock()
            .invocations
            .iter()
            .map(|i| i.command.clone())
            .collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.lock()
            .invocations
            .iter()
            .filter(|i| i.command.contains(pattern))
            .count()
    }

    /// Name the pipeline step a recorded command belongs to.
    pub fn classify(command: &str) -> &'static str {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return "other";
        };
        let program = Path::new(first)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match (program.as_str(), tokens.get(1).copied(), tokens.get(3).copied()) {
            ("cmake", _, _) => "configure",
            ("ninja", Some("install"), _) => "install",
            ("ninja", Some("clean"), _) => "clean",
            ("java", _, Some("d")) => "decompile",
            ("java", _, Some("b")) => "recompile",
            ("zipalign", _, _) => "align",
            ("apksigner", Some("sign"), _) => "sign",
            ("apksigner", Some("verify"), _) => "verify",
            ("adb", _, _) => "adb",
            _ => "other",
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ToolchainState> {
        self.state.lock().unwrap()
    }

    fn emulate(&self, cmd: &ProcessBuilder) -> Result<()> {
        let args: Vec<String> = cmd
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let program = cmd
            .get_program()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match program.as_str() {
            "cmake" => {
                if let Some(cwd) = cmd.get_cwd() {
                    fs::write(cwd.join("CMakeCache.txt"), "# fake cache\n")?;
                }
            }
            "ninja" if args.first().map(String::as_str) == Some("install") => {
                let install = self.lock().install.clone();
                if let Some((dir, lib)) = install {
                    fs::create_dir_all(&dir)?;
                    fs::write(dir.join(format!("lib{}.so", lib)), "\x7fELF coop")?;
                }
            }
            "java" => match (args.get(2).map(String::as_str), args.get(4)) {
                (Some("d"), Some(out)) => self.decompile(Path::new(out))?,
                (Some("b"), Some(out)) => {
                    let tree = args.get(5).map(PathBuf::from).unwrap_or_default();
                    let mut contents = String::from("PK apk\n");
                    for entry in walkdir::WalkDir::new(&tree).sort_by_file_name() {
                        let entry = entry?;
                        if entry.file_type().is_file() {
                            contents.push_str(&entry.path().strip_prefix(&tree)?.display().to_string());
                            contents.push('\n');
                        }
                    }
                    fs::write(out, contents)?;
                }
                _ => {}
            },
            "zipalign" => {
                if let [.., input, output] = args.as_slice() {
                    fs::copy(input, output)?;
                }
            }
            "apksigner" if args.first().map(String::as_str) == Some("sign") => {
                let value = |key: &str| {
                    args.iter()
                        .find_map(|a| a.strip_prefix(key))
                        .map(PathBuf::from)
                };
                if let (Some(input), Some(output)) = (value("--in="), value("--out=")) {
                    fs::copy(input, output)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn decompile(&self, out: &Path) -> Result<()> {
        let abis = self.lock().abis.clone();
        for abi in abis {
            let dir = out.join("lib").join(abi);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("libGTASA.so"), "\x7fELF gtasa")?;
        }
        let smali = out.join("smali/com/rockstargames/gtasa");
        fs::create_dir_all(&smali)?;
        fs::write(smali.join("GTASA.smali"), ".class public Lcom/rockstargames/gtasa/GTASA;\n")?;
        fs::write(out.join("AndroidManifest.xml"), "<manifest/>\n")?;
        Ok(())
    }
}

impl Executor for FakeToolchain {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ExitInfo> {
        let command = cmd.display_command();
        let canned = {
            let mut state = self.lock();
            state.invocations.push(Invocation {
                command: command.clone(),
                cwd: cmd.get_cwd().map(Path::to_path_buf),
            });
            state
                .overrides
                .iter()
                .find(|o| command.contains(o.pattern.as_str()))
                .map(|o| o.code)
        };

        if let Some(code) = canned {
            return Ok(ExitInfo { code });
        }
        self.emulate(cmd)?;
        Ok(ExitInfo::code(0))
    }
}

/// Throwaway workspace with everything a pipeline run reads.
pub struct PipelineFixture {
    root: TempDir,
    config: Config,
}

impl Default for PipelineFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineFixture {
    /// Contents of the patch artifact.
    pub const PATCH_CONTENTS: &'static str = ".class public Lcom/rockstargames/gtasa/GTASA;\n# patched\n";

    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path().canonicalize().unwrap();

        let sdk = base.join("sdk");
        let ndk = sdk.join("ndk/26.1.10909125");
        for dir in ["build-tools/34.0.0", "cmake/3.22.1/bin", "platform-tools"] {
            fs::create_dir_all(sdk.join(dir)).unwrap();
        }
        let runtime = ndk
            .join("toolchains/llvm/prebuilt")
            .join(crate::android::sdk::host_tag())
            .join("sysroot/usr/lib/aarch64-linux-android/libc++_shared.so");
        fs::create_dir_all(runtime.parent().unwrap()).unwrap();
        fs::write(&runtime, "\x7fELF c++").unwrap();

        fs::create_dir_all(base.join("smali")).unwrap();
        fs::write(base.join("smali/GTASA.smali"), Self::PATCH_CONTENTS).unwrap();
        fs::write(base.join("base.apk"), "PK baseline").unwrap();
        fs::create_dir_all(base.join("tools")).unwrap();
        fs::write(base.join("tools/apktool.jar"), "jar").unwrap();
        fs::write(base.join("tools/java"), "").unwrap();
        fs::create_dir_all(base.join("project")).unwrap();
        fs::write(base.join("project/CMakeLists.txt"), "project(coop C CXX)\n").unwrap();

        let mut config = Config::from_json_str(
            r#"{
                "install_dir": "out",
                "build_basedir": "build/coop",
                "enable_debug": false,
                "baseapk_file": "base.apk",
                "apktool_program": "tools/apktool.jar",
                "android_keypath_env": "APKSTAGE_TEST_KS",
                "android_keyalias_env": "APKSTAGE_TEST_ALIAS",
                "android_keypass_env": "APKSTAGE_TEST_PASS",
                "android_sdk": "sdk",
                "project_dir": "project",
                "java_program": "tools/java"
            }"#,
        )
        .unwrap();
        config.resolve_paths(&base);
        config.validate().unwrap();

        PipelineFixture { root, config }
    }

    pub fn with_lib_name(mut self, lib_name: &str) -> Self {
        self.config.lib_name = lib_name.to_string();
        self
    }

    pub fn with_verify_policy(mut self, policy: VerifyPolicy) -> Self {
        self.config.verify_policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn install_dir(&self) -> PathBuf {
        self.config.install_dir.clone()
    }

    pub fn project_dir(&self) -> PathBuf {
        self.config.project_dir.clone().unwrap()
    }

    /// A context running every tool through `fake`.
    pub fn context(&self, fake: FakeToolchain) -> GlobalContext {
        fake.set_install_target(&self.config.install_dir, &self.config.lib_name);

        let sdk = AndroidSdk::from_root(self.config.android_sdk.as_ref().unwrap()).unwrap();
        let signing = SigningIdentity {
            keystore: self.root().join("release.jks"),
            key_alias: "coop-key".to_string(),
            pass_env: self.config.key_pass_env.clone(),
        };

        GlobalContext::new(
            self.root().to_path_buf(),
            self.config.clone(),
            signing,
            sdk,
            Arc::new(fake),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_fails_on_pattern() {
        let fake = FakeToolchain::new();
        fake.fail_on("connect", 7);

        let ok = fake.run(&ProcessBuilder::new("adb").arg("devices")).unwrap();
        let failed = fake.run(&ProcessBuilder::new("adb").arg("connect")).unwrap();

        assert!(ok.success());
        assert_eq!(failed.code, Some(7));
        assert_eq!(fake.calls(), ["adb devices", "adb connect"]);
    }

    #[test]
    fn test_silenced_and_terminated_commands() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeToolchain::new();
        fake.silence("zipalign");
        fake.terminate_on("logcat");

        let input = tmp.path().join("in.apk");
        fs::write(&input, "zip").unwrap();
        let align = ProcessBuilder::new("zipalign")
            .arg(&input)
            .arg(tmp.path().join("out.apk"));

        assert!(fake.run(&align).unwrap().success());
        assert!(!tmp.path().join("out.apk").exists());
        let logcat = fake.run(&ProcessBuilder::new("adb").arg("logcat")).unwrap();
        assert_eq!(logcat.code, None);
    }

    #[test]
    fn test_clones_share_state() {
        let fake = FakeToolchain::new();
        let other = fake.clone();
        other.run(&ProcessBuilder::new("ninja").arg("clean")).unwrap();
        assert_eq!(fake.count_matching("ninja"), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(FakeToolchain::classify("/sdk/cmake/3.22.1/bin/cmake -GNinja /p"), "configure");
        assert_eq!(FakeToolchain::classify("/sdk/cmake/3.22.1/bin/ninja install"), "install");
        assert_eq!(FakeToolchain::classify("/usr/bin/java -jar a.jar d --output t b.apk"), "decompile");
        assert_eq!(FakeToolchain::classify("/sdk/bt/apksigner verify -v x"), "verify");
    }

    #[test]
    fn test_fixture_context_resolves_sdk() {
        let fixture = PipelineFixture::new();
        let ctx = fixture.context(FakeToolchain::new());
        assert!(ctx.sdk().ndk().ends_with("ndk/26.1.10909125"));
        assert!(ctx
            .sdk()
            .cxx_runtime(ctx.config().target_abi, "c++_shared")
            .is_file());
        assert_eq!(ctx.project_dir(), fixture.project_dir());
    }
}
