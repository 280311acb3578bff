use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
// Local side of the comparison: every regular file under a root, with its size

/// Regular file found under the local root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl LocalEntry {
    /// Basename used as the comparison key, `None` when it is not valid UTF-8
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Handle on a local tree that can be enumerated any number of times
#[derive(Debug, Clone)]
pub struct LocalManifest {
    root: PathBuf,
}

impl LocalManifest {
    /// Open a manifest over `root`; only the root itself has to be readable
    pub fn open<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = fs::metadata(&root)?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        // Surface permission problems on the root now rather than as a warning mid-walk
        fs::read_dir(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree. Each call starts an independent walk.
    ///
    /// Symlinks are not followed. Entries that cannot be read are logged and
    /// skipped. Siblings are visited in file name order so the listing shown
    /// to the operator is the same from one run to the next.
    pub fn entries(&self) -> impl Iterator<Item = LocalEntry> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    log::warn!("skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| match e.metadata() {
                Ok(metadata) => Some(LocalEntry {
                    path: e.into_path(),
                    size: metadata.len(),
                }),
                Err(err) => {
                    log::warn!("skipping {}: {}", e.path().display(), err);
                    None
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, size: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![b'x'; size]).unwrap();
    }

    #[test]
    fn test_entries_include_nested_files() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("file1.txt"), 100);
        write_file(&tmp.path().join("file2.txt"), 100);
        write_file(&tmp.path().join("subdir/file3.txt"), 100);

        let manifest = LocalManifest::open(tmp.path()).unwrap();
        let entries: Vec<LocalEntry> = manifest.entries().collect();

        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries,
            vec![
                LocalEntry { path: tmp.path().join("file1.txt"), size: 100 },
                LocalEntry { path: tmp.path().join("file2.txt"), size: 100 },
                LocalEntry { path: tmp.path().join("subdir/file3.txt"), size: 100 },
            ]
        );
    }

    #[test]
    fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("empty_subdir")).unwrap();

        let manifest = LocalManifest::open(tmp.path()).unwrap();
        assert_eq!(manifest.entries().count(), 0);
    }

    #[test]
    fn test_entries_is_restartable() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("a.txt"), 1);
        write_file(&tmp.path().join("b/c.txt"), 2);

        let manifest = LocalManifest::open(tmp.path()).unwrap();
        let first: Vec<_> = manifest.entries().collect();
        let second: Vec<_> = manifest.entries().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_duplicate_basenames_are_distinct_entries() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("one/same.txt"), 10);
        write_file(&tmp.path().join("two/same.txt"), 20);

        let manifest = LocalManifest::open(tmp.path()).unwrap();
        let sizes: Vec<u64> = manifest.entries().map(|e| e.size).collect();
        assert_eq!(sizes, vec![10, 20]);
        assert!(manifest.entries().all(|e| e.file_name() == Some("same.txt")));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalManifest::open(tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_file_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain.txt");
        write_file(&file, 5);
        let err = LocalManifest::open(&file).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_reported() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("real.txt"), 3);
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();

        let manifest = LocalManifest::open(tmp.path()).unwrap();
        let names: Vec<String> = manifest
            .entries()
            .filter_map(|e| e.file_name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["real.txt".to_string()]);
    }
}
