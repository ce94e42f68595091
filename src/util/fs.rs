//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob, Pattern};

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file, if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a path whether it is a file or a directory tree.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("failed to stat: {}", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))
    } else {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Copy a file, overwriting the destination and creating its parent.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst).with_context(|| {
        format!("failed to copy {} to {}", src.display(), dst.display())
    })?;
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// List the immediate entries of a directory, sorted by path.
pub fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

/// List the names of the immediate subdirectories of a directory, sorted.
pub fn list_subdir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = list_dir(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    Ok(names)
}

/// Find files in `base` whose names match a glob pattern.
pub fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    // The base directory is literal; only `pattern` may contain wildcards.
    let escaped = Pattern::escape(&base.to_string_lossy());
    let full_pattern = Path::new(&escaped).join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut results = Vec::new();
    for entry in glob(&pattern_str)
        .with_context(|| format!("invalid glob pattern: {}", pattern))?
    {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    results.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the path as-is if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("libcoop.so"), "elf").unwrap();
        fs::write(tmp.path().join("libextra.so"), "elf").unwrap();
        fs::write(tmp.path().join("coop v0.104.apk"), "zip").unwrap();
        fs::create_dir(tmp.path().join("libdir")).unwrap();

        let files = glob_files(tmp.path(), "lib*").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_file()));
    }

    #[test]
    fn test_list_subdir_names() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("x86_64")).unwrap();
        fs::create_dir(tmp.path().join("arm64-v8a")).unwrap();
        fs::write(tmp.path().join("stray.txt"), "").unwrap();

        let names = list_subdir_names(tmp.path()).unwrap();
        assert_eq!(names, vec!["arm64-v8a", "x86_64"]);
    }

    #[test]
    fn test_copy_file_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("nested/dir/b.txt");
        fs::write(&src, "content").unwrap();

        copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "content");
    }

    #[test]
    fn test_remove_path_handles_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f");
        let dir = tmp.path().join("d");
        fs::write(&file, "").unwrap();
        fs::create_dir_all(dir.join("inner")).unwrap();

        remove_path(&file).unwrap();
        remove_path(&dir).unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }
}
