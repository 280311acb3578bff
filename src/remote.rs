//! Remote side of the comparison
//!
//! Only the basenames that exist locally are looked up, one `find -name`
//! per name, so a huge remote tree that shares few names with the local one
//! costs a handful of commands instead of a full listing.

use std::collections::{HashMap, HashSet};

use crate::error::TransportError;
use crate::transport::{RemoteQuery, RemoteShell};

/// Location and size of a file on the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub size: u64,
    pub path: String,
}

/// Basename -> remote file, one entry per distinct name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteManifest {
    files: HashMap<String, RemoteFile>,
}

impl RemoteManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, file: RemoteFile) {
        self.files.insert(name.into(), file);
    }

    pub fn get(&self, name: &str) -> Option<&RemoteFile> {
        self.files.get(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, RemoteFile)> for RemoteManifest {
    fn from_iter<T: IntoIterator<Item = (S, RemoteFile)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Look up every name under `root`. Names missing on the remote are left out;
/// any transport fault aborts the whole resolution.
pub fn resolve_remote_manifest<'a, Q, I>(
    query: &mut Q,
    root: &str,
    names: I,
) -> Result<RemoteManifest, TransportError>
where
    Q: RemoteQuery + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let mut manifest = RemoteManifest::new();
    let mut seen = HashSet::new();

    for name in names {
        if !seen.insert(name) {
            continue;
        }
        log::debug!("locating {} under {}", name, root);
        let Some(path) = query.find_by_name(root, name)? else {
            continue;
        };
        match query.stat_size(&path)? {
            Some(size) => manifest.insert(name, RemoteFile { size, path }),
            None => log::warn!("found {} but could not stat it, skipping", path),
        }
    }

    Ok(manifest)
}

/// Quote `s` as one POSIX shell word
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Escape `find -name` pattern characters so `name` only matches itself
pub fn escape_glob(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Shell word for a remote root. A leading `~` stays outside the quotes as
/// `"$HOME"` so home-relative roots resolve like they would in a login shell.
pub fn root_arg(root: &str) -> String {
    if root == "~" {
        return "\"$HOME\"".to_string();
    }
    match root.strip_prefix("~/") {
        Some(rest) if rest.is_empty() => "\"$HOME\"/".to_string(),
        Some(rest) => format!("\"$HOME\"/{}", shell_quote(rest)),
        None => shell_quote(root),
    }
}

pub fn find_command(root: &str, name: &str) -> String {
    format!(
        "find {} -type f -name {}",
        root_arg(root),
        shell_quote(&escape_glob(name))
    )
}

pub fn dir_check_command(root: &str) -> String {
    format!("test -d {}", root_arg(root))
}

pub fn stat_command(path: &str) -> String {
    format!("stat -c %s {}", shell_quote(path))
}

/// [`RemoteQuery::find_by_name`] on top of a plain command runner.
///
/// Several matches are resolved to the lexicographically smallest path. That
/// is a known limitation: which same-named file is compared is not something
/// the operator chooses.
pub fn find_via_shell<S: RemoteShell + ?Sized>(
    shell: &mut S,
    root: &str,
    name: &str,
) -> Result<Option<String>, TransportError> {
    let output = shell.exec(&find_command(root, name))?;
    let mut matches: Vec<&str> = output.stdout.lines().filter(|l| !l.is_empty()).collect();
    if !output.success() {
        if matches.is_empty() {
            log::debug!(
                "find for {} exited with {}: {}",
                name,
                output.exit_status,
                output.stderr.trim()
            );
            return Ok(None);
        }
        log::warn!(
            "find for {} exited with {}, using partial results: {}",
            name,
            output.exit_status,
            output.stderr.trim()
        );
    }
    matches.sort_unstable();
    if matches.len() > 1 {
        log::warn!(
            "{} remote files named {}, comparing against {}",
            matches.len(),
            name,
            matches[0]
        );
    }
    Ok(matches.first().map(|p| p.to_string()))
}

/// [`RemoteQuery::dir_exists`] on top of a plain command runner
pub fn dir_exists_via_shell<S: RemoteShell + ?Sized>(
    shell: &mut S,
    root: &str,
) -> Result<bool, TransportError> {
    let output = shell.exec(&dir_check_command(root))?;
    if !output.success() && !output.stderr.trim().is_empty() {
        log::debug!("test -d {} exited with {}: {}", root, output.exit_status, output.stderr.trim());
    }
    Ok(output.success())
}

/// [`RemoteQuery::stat_size`] on top of a plain command runner
pub fn stat_via_shell<S: RemoteShell + ?Sized>(
    shell: &mut S,
    path: &str,
) -> Result<Option<u64>, TransportError> {
    let command = stat_command(path);
    let output = shell.exec(&command)?;
    if !output.success() {
        log::warn!("stat {} failed: {}", path, output.stderr.trim());
        return Ok(None);
    }
    output
        .stdout
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| TransportError::UnexpectedOutput {
            command,
            output: output.stdout.clone(),
        })
}
