// Filesystem sink. The orchestrator serializes all writes through here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

// Replaces every non-alphanumeric byte with _.
pub fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

// Finds a free path under dir for sanitize(name)<ext>, suffixing _1, _2, ...
// until one doesn't already exist.
pub fn unique_path(dir: &Path, name: &str, ext: &str) -> PathBuf {
    let base = sanitize(name);
    let mut candidate = dir.join(format!("{base}{ext}"));
    let mut suffix: u64 = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{base}_{suffix}{ext}"));
        suffix += 1;
    }
    candidate
}

pub fn write_file(dir: &Path, name: &str, ext: &str, contents: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = unique_path(dir, name, ext);
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rbxl_extractor_sink_test_{label}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn sanitize_replaces_non_alphanumeric() {
        assert_eq!(sanitize("My Script/v2"), "My_Script_v2");
        assert_eq!(sanitize(""), "unnamed");
    }

    #[test]
    fn unique_path_suffixes_grow_monotonically() {
        let dir = scratch_dir("unique_path");
        fs::create_dir_all(&dir).unwrap();

        let first = unique_path(&dir, "Script", ".lua");
        fs::write(&first, b"one").unwrap();
        let second = unique_path(&dir, "Script", ".lua");
        assert_ne!(first, second);
        assert!(second.to_string_lossy().contains("_1"));
        fs::write(&second, b"two").unwrap();

        let third = unique_path(&dir, "Script", ".lua");
        assert!(third.to_string_lossy().contains("_2"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn write_file_creates_directory_and_returns_unique_paths() {
        let dir = scratch_dir("write_file");
        let first = write_file(&dir, "Dup", ".txt", b"a").unwrap();
        let second = write_file(&dir, "Dup", ".txt", b"b").unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"a");
        assert_eq!(fs::read(&second).unwrap(), b"b");
        fs::remove_dir_all(&dir).unwrap();
    }
}
