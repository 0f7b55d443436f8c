//! Directory listings and path containment

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Parent directory marker, first entry of every listing below the root
pub const PARENT_DIR: &str = "..";

/// Listing of the current directory as returned to callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// `..` (except at the root), then sorted sub-directories
    pub dirs: Vec<String>,
    /// Sorted playable files
    pub files: Vec<String>,
    /// `(seconds, formatted)` per entry of `files`
    pub dur: Vec<(u64, String)>,
    pub cur_file: Option<String>,
    /// Root-relative directory with leading and trailing `/`
    pub cur_dir: String,
}

/// Sub-directories and playable files of `dir`, both sorted
pub async fn scan_directory(
    dir: &Path,
    extensions: &[String],
) -> std::io::Result<(Vec<String>, Vec<String>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        // Follows symlinks
        let metadata = match tokio::fs::metadata(entry.path()).await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };

        if metadata.is_dir() {
            dirs.push(name);
        } else if metadata.is_file() && has_extension(&name, extensions) {
            files.push(name);
        }
    }

    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

/// Case-insensitive extension match
pub fn has_extension(name: &str, extensions: &[String]) -> bool {
    match Path::new(name).extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy();
            extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        }
        None => false,
    }
}

/// Lexically resolve `.` and `..` components.
///
/// `..` at the filesystem root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Whether `path` lies at or below `root` (both normalized)
pub fn is_contained(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

/// Root-relative form of a directory: `/` for the root, else `/a/b/`
pub fn relative_dir(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
        Ok(rel) => format!("/{}/", rel.to_string_lossy()),
        Err(_) => format!("{}/", dir.to_string_lossy()),
    }
}

/// File name component as a string
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/music/jazz/../rock/./a")), PathBuf::from("/music/rock/a"));
        assert_eq!(normalize(Path::new("/music/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("/music/")), PathBuf::from("/music"));
    }

    #[test]
    fn test_containment() {
        let root = Path::new("/music");
        assert!(is_contained(root, Path::new("/music")));
        assert!(is_contained(root, Path::new("/music/jazz")));
        assert!(!is_contained(root, Path::new("/etc")));
        // Component-wise, not a string prefix
        assert!(!is_contained(root, Path::new("/musical")));
    }

    #[test]
    fn test_relative_dir() {
        let root = Path::new("/music");
        assert_eq!(relative_dir(root, Path::new("/music")), "/");
        assert_eq!(relative_dir(root, Path::new("/music/jazz/60s")), "/jazz/60s/");
    }

    #[test]
    fn test_extension_match() {
        let extensions = vec!["mp3".to_string()];
        assert!(has_extension("a.mp3", &extensions));
        assert!(has_extension("A.MP3", &extensions));
        assert!(!has_extension("cover.jpg", &extensions));
        assert!(!has_extension("mp3", &extensions));
    }

    #[tokio::test]
    async fn test_scan_sorts_and_filters() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp3", "a.mp3", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();

        let (dirs, files) = scan_directory(dir.path(), &["mp3".to_string()]).await.unwrap();
        assert_eq!(dirs, vec!["alpha", "zeta"]);
        assert_eq!(files, vec!["a.mp3", "b.mp3"]);
    }
}
