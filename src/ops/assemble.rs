//! APK assembly: unpack, patch, prune, inject native libraries, repack,
//! align, sign and verify.
//!
//! The stages run strictly in order and each one checks the previous
//! stage's output before starting. The extraction tree is reused whenever
//! it already exists; the release package is rebuilt on every run.
//!
//! The signer writes to a staging file that only takes the release name
//! after verification, so a failed run never leaves a file that looks like
//! a finished release.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::cmake::CMakeBuilder;
use crate::core::abi::AndroidAbi;
use crate::ops::errors::{PipelineError, Stage};
use crate::ops::run_tool;
use crate::util::config::VerifyPolicy;
use crate::util::context::GlobalContext;
use crate::util::fs::{
    copy_file, ensure_dir, glob_files, list_subdir_names, read_to_string, remove_dir_all_if_exists,
    remove_file_if_exists, write_string,
};
use crate::util::hash::sha256_file;
use crate::util::process::{locate_program, ProcessBuilder};

/// `zipalign` boundary in bytes.
const ALIGNMENT: &str = "4";

/// Install directory entries copied into the target ABI folder.
const SHARED_LIBRARY_GLOB: &str = "lib*.so";

/// What happened to the extraction tree during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The baseline package was decompiled, patched and pruned.
    Extracted,
    /// An existing tree was reused as-is.
    Reused(Freshness),
}

/// How a reused tree compares with the current inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fingerprints match the baseline, patch and ABI.
    Current,
    /// The tree was produced from different inputs.
    Stale,
    /// No usable fingerprint on either side.
    Unknown,
}

/// Summary of a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleReport {
    pub release: PathBuf,
    pub extraction: Extraction,
    /// Files copied into the target ABI directory, in copy order.
    pub copied: Vec<PathBuf>,
    /// Verifier verdict; `None` when verification was skipped.
    pub verified: Option<bool>,
}

/// Fingerprint of the inputs an extraction tree was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExtractionStamp {
    baseline_sha256: String,
    patch_sha256: String,
    abi: AndroidAbi,
}

impl ExtractionStamp {
    fn current(ctx: &GlobalContext) -> Result<Self> {
        let config = ctx.config();
        Ok(ExtractionStamp {
            baseline_sha256: sha256_file(&config.base_apk)?,
            patch_sha256: sha256_file(&config.patch_file)?,
            abi: config.target_abi,
        })
    }
}

/// Produce the signed release package.
///
/// Configures the build directory first if it does not exist yet.
pub fn assemble(ctx: &GlobalContext) -> Result<AssembleReport> {
    let builder = CMakeBuilder::new(ctx);
    if !builder.build_dir().exists() {
        builder.configure()?;
    }

    let release = ctx.layout().release.path().to_path_buf();
    tracing::info!("Assembling {}", release.display());

    let extraction = unpack_and_patch(ctx)?;
    let copied = copy_install_artifacts(ctx, &builder)?;
    repack(ctx)?;
    align(ctx)?;
    let verified = sign_and_verify(ctx)?;

    Ok(AssembleReport {
        release,
        extraction,
        copied,
        verified,
    })
}

fn apktool(ctx: &GlobalContext, stage: Stage) -> Result<ProcessBuilder> {
    let config = ctx.config();
    let java = locate_program(&config.java_program).ok_or_else(|| {
        PipelineError::missing(stage, "Java launcher", &config.java_program)
            .with_hint("install a JRE or set `java_program` in the configuration")
    })?;
    if !config.apktool.is_file() {
        return Err(PipelineError::missing(stage, "apktool", &config.apktool).into());
    }
    Ok(ProcessBuilder::new(java).arg("-jar").arg(&config.apktool))
}

/// Stage 1: decompile the baseline package, overwrite the patch target and
/// delete every ABI directory except the target one.
fn unpack_and_patch(ctx: &GlobalContext) -> Result<Extraction> {
    let tree = &ctx.layout().extraction_tree;

    if tree.exists() {
        let freshness = check_freshness(ctx);
        match freshness {
            Freshness::Current => {
                tracing::info!("Reusing extraction tree {}", tree.root().display())
            }
            Freshness::Stale => tracing::warn!(
                "extraction tree {} was produced from a different baseline, patch or ABI; \
                 remove it to re-extract",
                tree.root().display()
            ),
            Freshness::Unknown => tracing::warn!(
                "reusing extraction tree {} without a fingerprint; remove it if the baseline changed",
                tree.root().display()
            ),
        }
        return Ok(Extraction::Reused(freshness));
    }

    let config = ctx.config();
    if !config.base_apk.is_file() {
        return Err(
            PipelineError::missing(Stage::Decompile, "baseline package", &config.base_apk).into(),
        );
    }
    if !config.patch_file.is_file() {
        return Err(
            PipelineError::missing(Stage::Patch, "patch artifact", &config.patch_file).into(),
        );
    }

    ensure_dir(&ctx.layout().install_dir)?;

    if let Err(e) = extract(ctx) {
        // Existence is the only completeness signal, so a half-built tree
        // must not survive to be reused by the next run.
        tracing::warn!("removing incomplete extraction tree {}", tree.root().display());
        remove_dir_all_if_exists(tree.root())?;
        return Err(e);
    }

    Ok(Extraction::Extracted)
}

fn extract(ctx: &GlobalContext) -> Result<()> {
    let config = ctx.config();
    let tree = &ctx.layout().extraction_tree;

    tracing::info!("Decompiling {}", config.base_apk.display());
    let cmd = apktool(ctx, Stage::Decompile)?
        .arg("d")
        .arg("--output")
        .arg(tree.root())
        .arg(&config.base_apk);
    run_tool(ctx.executor(), Stage::Decompile, "apktool", &cmd)?;

    if !tree.exists() {
        return Err(
            PipelineError::missing(Stage::Decompile, "extraction tree", tree.root()).into(),
        );
    }

    let target = tree.root().join(&config.patch_target);
    match target.parent() {
        Some(parent) if parent.is_dir() => {}
        _ => {
            return Err(
                PipelineError::missing(Stage::Patch, "patch target directory", &target).into(),
            )
        }
    }
    tracing::info!("Patching {}", config.patch_target.display());
    copy_file(&config.patch_file, &target)?;

    prune(ctx)?;

    let stamp = ExtractionStamp::current(ctx)?;
    let json = serde_json::to_string_pretty(&stamp).context("failed to serialize stamp")?;
    write_string(&tree.stamp_path(), &json)?;
    Ok(())
}

/// Delete every ABI directory under `lib/` except the target.
fn prune(ctx: &GlobalContext) -> Result<()> {
    let tree = &ctx.layout().extraction_tree;
    let abi = ctx.config().target_abi;
    let lib_dir = tree.lib_dir();

    if !lib_dir.is_dir() {
        return Err(PipelineError::missing(Stage::Prune, "library folder", lib_dir).into());
    }

    let present = list_subdir_names(&lib_dir)?;
    if !present.iter().any(|name| name == abi.as_str()) {
        return Err(PipelineError::Invalid {
            stage: Stage::Prune,
            message: format!(
                "target ABI `{}` is not in the baseline package (found: {})",
                abi,
                present.join(", ")
            ),
        }
        .into());
    }

    for name in present.iter().filter(|name| *name != abi.as_str()) {
        tracing::info!("Pruning lib/{}", name);
        remove_dir_all_if_exists(&lib_dir.join(name))?;
    }
    Ok(())
}

fn check_freshness(ctx: &GlobalContext) -> Freshness {
    let stamp_path = ctx.layout().extraction_tree.stamp_path();
    let recorded: Option<ExtractionStamp> = read_to_string(&stamp_path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok());

    match (recorded, ExtractionStamp::current(ctx)) {
        (Some(recorded), Ok(current)) if recorded == current => Freshness::Current,
        (Some(_), Ok(_)) => Freshness::Stale,
        _ => Freshness::Unknown,
    }
}

/// Stage 2: rebuild the native library and copy the runtime and installed
/// libraries into the target ABI directory.
fn copy_install_artifacts(ctx: &GlobalContext, builder: &CMakeBuilder<'_>) -> Result<Vec<PathBuf>> {
    builder.install()?;

    let config = ctx.config();
    let layout = ctx.layout();
    let abi_dir = layout.extraction_tree.abi_dir(config.target_abi);
    if !abi_dir.is_dir() {
        return Err(
            PipelineError::missing(Stage::CopyArtifacts, "target ABI directory", abi_dir)
                .with_hint("remove the extraction tree to re-extract the baseline package")
                .into(),
        );
    }

    let mut copied = Vec::new();

    let runtime_name = format!("lib{}.so", config.stl);
    let runtime_dest = abi_dir.join(&runtime_name);
    if !runtime_dest.is_file() {
        let runtime = ctx.sdk().cxx_runtime(config.target_abi, &config.stl);
        if !runtime.is_file() {
            return Err(
                PipelineError::missing(Stage::CopyArtifacts, "C++ runtime library", runtime)
                    .into(),
            );
        }
        tracing::info!("Copying {}", runtime_name);
        copy_file(&runtime, &runtime_dest)?;
        copied.push(runtime_dest);
    }

    // Release packages share the install directory and may carry a `lib`
    // prefix too; only shared objects are library artifacts.
    let release = &layout.release;
    let mut packages = release.transient_paths().to_vec();
    packages.push(release.path().to_path_buf());
    let libs: Vec<PathBuf> = glob_files(&layout.install_dir, SHARED_LIBRARY_GLOB)?
        .into_iter()
        .filter(|lib| !packages.contains(lib))
        .collect();
    if libs.is_empty() {
        return Err(PipelineError::missing(
            Stage::CopyArtifacts,
            "installed native libraries",
            layout.install_dir.join(SHARED_LIBRARY_GLOB),
        )
        .with_hint("check that the CMake install step writes into `install_dir`")
        .into());
    }

    for lib in libs {
        let Some(name) = lib.file_name() else {
            continue;
        };
        let dest = abi_dir.join(name);
        if dest.exists() {
            tracing::debug!("overwriting {}", dest.display());
        }
        copy_file(&lib, &dest)?;
        copied.push(dest);
    }
    tracing::info!("Copied {} libraries into lib/{}", copied.len(), config.target_abi);

    Ok(copied)
}

/// Stage 3: rebuild the package from the extraction tree.
fn repack(ctx: &GlobalContext) -> Result<()> {
    let tree = &ctx.layout().extraction_tree;
    let unaligned = ctx.layout().release.unaligned();

    tracing::info!("Recompiling {}", tree.root().display());
    let cmd = apktool(ctx, Stage::Recompile)?
        .arg("b")
        .arg("--output")
        .arg(&unaligned)
        .arg(tree.root());
    run_tool(ctx.executor(), Stage::Recompile, "apktool", &cmd)?;

    if !unaligned.is_file() {
        return Err(PipelineError::missing(Stage::Recompile, "repacked package", unaligned).into());
    }
    Ok(())
}

/// Stage 4: align the repacked package. Must precede signing.
fn align(ctx: &GlobalContext) -> Result<()> {
    let release = &ctx.layout().release;
    let (unaligned, aligned) = (release.unaligned(), release.aligned());

    tracing::info!("Aligning to {} bytes", ALIGNMENT);
    let cmd = ProcessBuilder::new(ctx.sdk().zipalign())
        .args(["-p", "-v", "-f", ALIGNMENT])
        .arg(&unaligned)
        .arg(&aligned);
    run_tool(ctx.executor(), Stage::Align, "zipalign", &cmd)?;

    if !aligned.is_file() {
        return Err(PipelineError::missing(Stage::Align, "aligned package", aligned).into());
    }
    Ok(())
}

/// Outcome of the signer.
enum SignOutcome {
    /// Exit 0 and the staged output exists.
    Signed,
    /// The signer ran but produced nothing.
    Missing,
    /// The signer failed.
    Failed(anyhow::Error),
}

/// Stage 5: sign to a staging file, verify per policy, promote to the
/// release name and drop the transient files.
///
/// Transient files are only deleted once the release is in place; on any
/// failure they are kept for inspection and the staged output is removed.
fn sign_and_verify(ctx: &GlobalContext) -> Result<Option<bool>> {
    let release = &ctx.layout().release;
    let staged = release.staged();
    remove_file_if_exists(&staged)?;

    let outcome = match sign(ctx) {
        Ok(()) if staged.is_file() => SignOutcome::Signed,
        Ok(()) => SignOutcome::Missing,
        Err(e) => SignOutcome::Failed(e),
    };

    match outcome {
        SignOutcome::Signed => {}
        SignOutcome::Missing => {
            keep_evidence(ctx);
            return Err(PipelineError::missing(Stage::Sign, "signed package", staged).into());
        }
        SignOutcome::Failed(e) => {
            remove_file_if_exists(&staged)?;
            keep_evidence(ctx);
            return Err(e);
        }
    }

    let verified = match ctx.config().verify_policy {
        VerifyPolicy::Skip => None,
        policy => {
            let result = verify(ctx);
            match (result, policy) {
                (Ok(()), _) => Some(true),
                (Err(e), VerifyPolicy::Advisory) => {
                    tracing::warn!("signature verification failed (advisory): {:#}", e);
                    Some(false)
                }
                (Err(e), _) => {
                    remove_file_if_exists(&staged)?;
                    keep_evidence(ctx);
                    return Err(e);
                }
            }
        }
    };

    // `rename` does not replace an existing file on every platform.
    remove_file_if_exists(release.path())?;
    std::fs::rename(&staged, release.path()).with_context(|| {
        format!(
            "failed to move {} to {}",
            staged.display(),
            release.path().display()
        )
    })?;

    remove_file_if_exists(&release.unaligned())?;
    remove_file_if_exists(&release.aligned())?;

    Ok(verified)
}

fn sign(ctx: &GlobalContext) -> Result<()> {
    let config = ctx.config();
    let signing = ctx.signing();
    let release = &ctx.layout().release;

    tracing::info!("Signing with key `{}`", signing.key_alias);
    let cmd = ProcessBuilder::new(ctx.sdk().apksigner())
        .args(["sign", "-v"])
        .arg(format!("--min-sdk-version={}", config.min_sdk))
        .arg(format!("--max-sdk-version={}", config.max_sdk))
        .arg(format!("--ks={}", signing.keystore.display()))
        .arg(format!("--ks-key-alias={}", signing.key_alias))
        .arg(format!("--ks-pass={}", signing.pass_source()))
        .arg(format!("--in={}", release.aligned().display()))
        .arg(format!("--out={}", release.staged().display()));
    run_tool(ctx.executor(), Stage::Sign, "apksigner", &cmd)
}

fn verify(ctx: &GlobalContext) -> Result<()> {
    let staged = ctx.layout().release.staged();

    tracing::info!("Verifying signature");
    let cmd = ProcessBuilder::new(ctx.sdk().apksigner())
        .args(["verify", "-v"])
        .arg(&staged);
    run_tool(ctx.executor(), Stage::Verify, "apksigner", &cmd)
}

fn keep_evidence(ctx: &GlobalContext) {
    let release = &ctx.layout().release;
    for path in [release.unaligned(), release.aligned()] {
        if path.is_file() {
            tracing::warn!("keeping {} for inspection", path.display());
        }
    }
}
