//! Size comparison between the local and remote manifests

use std::collections::HashMap;

use crate::fs_enum::LocalEntry;
use crate::remote::RemoteManifest;

/// One file whose size differs between the two sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub filename: String,
    pub local_size: u64,
    pub remote_size: u64,
    pub remote_path: String,
}

/// Ordered basename -> difference map.
///
/// Positions are 1-based and follow local traversal order; they are the
/// numbers the operator types at the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSet {
    entries: Vec<DiffEntry>,
    index: HashMap<String, usize>,
}

impl DiffSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter()
    }

    /// Entry at a 1-based display position
    pub fn position(&self, position: usize) -> Option<&DiffEntry> {
        position.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn get(&self, filename: &str) -> Option<&DiffEntry> {
        self.index.get(filename).map(|&i| &self.entries[i])
    }

    // A repeated name keeps its first position and takes the newer sizes
    fn upsert(&mut self, entry: DiffEntry) {
        match self.index.get(&entry.filename) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.filename.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

impl<'a> IntoIterator for &'a DiffSet {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Compare every local entry against the remote file of the same basename.
///
/// Names present on only one side are not differences.
pub fn diff<'a, I>(local: I, remote: &RemoteManifest) -> DiffSet
where
    I: IntoIterator<Item = &'a LocalEntry>,
{
    let mut set = DiffSet::default();
    for entry in local {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let Some(remote_file) = remote.get(name) else {
            continue;
        };
        if entry.size != remote_file.size {
            set.upsert(DiffEntry {
                filename: name.to_string(),
                local_size: entry.size,
                remote_size: remote_file.size,
                remote_path: remote_file.path.clone(),
            });
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteFile;
    use std::path::PathBuf;

    fn local(path: &str, size: u64) -> LocalEntry {
        LocalEntry { path: PathBuf::from(path), size }
    }

    fn remote(entries: &[(&str, u64, &str)]) -> RemoteManifest {
        entries
            .iter()
            .map(|(name, size, path)| (*name, RemoteFile { size: *size, path: path.to_string() }))
            .collect()
    }

    #[test]
    fn test_differences_only() {
        let local_files = vec![
            local("/local_dir/file1.txt", 100),
            local("/local_dir/file2.txt", 200),
        ];
        let remote_files = remote(&[
            ("file1.txt", 100, "/remote_dir/file1.txt"),
            ("file2.txt", 300, "/remote_dir/file2.txt"),
            ("file3.txt", 150, "/remote_dir/file3.txt"),
        ]);

        let set = diff(&local_files, &remote_files);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("file2.txt"),
            Some(&DiffEntry {
                filename: "file2.txt".into(),
                local_size: 200,
                remote_size: 300,
                remote_path: "/remote_dir/file2.txt".into(),
            })
        );
        assert!(set.get("file3.txt").is_none());
    }

    #[test]
    fn test_no_differences() {
        let local_files = vec![local("/l/file1.txt", 100), local("/l/file2.txt", 200)];
        let remote_files = remote(&[
            ("file1.txt", 100, "/r/file1.txt"),
            ("file2.txt", 200, "/r/file2.txt"),
        ]);
        assert!(diff(&local_files, &remote_files).is_empty());
    }

    #[test]
    fn test_one_sided_files_are_ignored() {
        let local_files = vec![local("/l/file1.txt", 100)];
        let remote_files = remote(&[("file2.txt", 200, "/r/file2.txt")]);
        assert!(diff(&local_files, &remote_files).is_empty());
    }

    #[test]
    fn test_order_follows_local_and_is_deterministic() {
        let local_files = vec![
            local("/l/c.txt", 1),
            local("/l/a.txt", 1),
            local("/l/sub/b.txt", 1),
            local("/l/same.txt", 5),
        ];
        let remote_files = remote(&[
            ("a.txt", 2, "/r/a.txt"),
            ("b.txt", 2, "/r/b.txt"),
            ("c.txt", 2, "/r/c.txt"),
            ("same.txt", 5, "/r/same.txt"),
        ]);

        let first = diff(&local_files, &remote_files);
        let names: Vec<&str> = first.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["c.txt", "a.txt", "b.txt"]);
        assert_eq!(first, diff(&local_files, &remote_files));

        assert_eq!(first.position(1).map(|e| e.filename.as_str()), Some("c.txt"));
        assert_eq!(first.position(3).map(|e| e.filename.as_str()), Some("b.txt"));
        assert!(first.position(0).is_none());
        assert!(first.position(4).is_none());
    }

    #[test]
    fn test_every_entry_is_shared_and_differs() {
        let local_files = vec![
            local("/l/a", 0),
            local("/l/b", 10),
            local("/l/c", 20),
            local("/l/d", 30),
        ];
        let remote_files = remote(&[("a", 1, "/r/a"), ("c", 20, "/r/c"), ("d", 31, "/r/d"), ("e", 9, "/r/e")]);

        let set = diff(&local_files, &remote_files);
        for entry in &set {
            assert!(remote_files.get(&entry.filename).is_some());
            assert!(local_files.iter().any(|l| l.file_name() == Some(entry.filename.as_str())));
            assert_ne!(entry.local_size, entry.remote_size);
        }
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_duplicate_local_basename_keeps_first_position() {
        let local_files = vec![
            local("/l/one/x.txt", 10),
            local("/l/y.txt", 1),
            local("/l/two/x.txt", 20),
        ];
        let remote_files = remote(&[("x.txt", 30, "/r/x.txt"), ("y.txt", 2, "/r/y.txt")]);

        let set = diff(&local_files, &remote_files);
        assert_eq!(set.len(), 2);
        let first = set.position(1).unwrap();
        assert_eq!(first.filename, "x.txt");
        assert_eq!(first.local_size, 20);
    }
}
