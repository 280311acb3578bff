//! Operator selection over the diff listing
//!
//! Grammar: `all`, or a comma separated list of positions (`3`) and
//! inclusive ranges (`1-5`). Positions are the 1-based numbers printed in
//! the listing.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crossterm::style::Stylize;
use thiserror::Error;

use crate::diff::DiffSet;

/// One file to pull: where it goes locally, where it comes from remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub local_destination: PathBuf,
    pub remote_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("nothing selected")]
    Empty,

    #[error("`{0}` is not a number or a range")]
    InvalidToken(String),

    #[error("{index} is outside 1-{len}")]
    OutOfRange { index: usize, len: usize },

    #[error("range {start}-{end} runs backwards")]
    ReversedRange { start: usize, end: usize },
}

/// Parse `expression` against `diff` into transfer requests.
///
/// Either the whole expression is valid or nothing is selected. Repeated
/// positions are kept as repeated requests.
pub fn parse_selection(
    expression: &str,
    diff: &DiffSet,
    local_root: &Path,
) -> Result<Vec<TransferRequest>, ParseError> {
    let positions = parse_positions(expression, diff.len())?;
    Ok(positions
        .into_iter()
        .filter_map(|p| diff.position(p))
        .map(|entry| TransferRequest {
            local_destination: local_root.join(&entry.filename),
            remote_source: entry.remote_path.clone(),
        })
        .collect())
}

/// Resolve `expression` into 1-based positions within `1..=len`
pub fn parse_positions(expression: &str, len: usize) -> Result<Vec<usize>, ParseError> {
    let expression = expression.trim();
    if expression.eq_ignore_ascii_case("all") {
        return Ok((1..=len).collect());
    }
    if expression.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut positions = Vec::new();
    for token in expression.split(',').map(str::trim) {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start, token, len)?;
                let end = parse_index(end, token, len)?;
                if start > end {
                    return Err(ParseError::ReversedRange { start, end });
                }
                positions.extend(start..=end);
            }
            None => positions.push(parse_index(token, token, len)?),
        }
    }
    Ok(positions)
}

fn parse_index(text: &str, token: &str, len: usize) -> Result<usize, ParseError> {
    let text = text.trim();
    // `usize::from_str` accepts a leading `+`, the grammar does not
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidToken(token.to_string()));
    }
    let index = text
        .parse::<usize>()
        .map_err(|_| ParseError::InvalidToken(token.to_string()))?;
    if index == 0 || index > len {
        return Err(ParseError::OutOfRange { index, len });
    }
    Ok(index)
}

/// Where selection expressions come from
pub trait SelectionSource {
    /// Show the differences the operator is choosing from
    fn present(&mut self, diff: &DiffSet);

    /// Next expression, `Ok(None)` once input is exhausted
    fn next_expression(&mut self) -> io::Result<Option<String>>;

    /// Tell the operator the last expression was refused
    fn reject(&mut self, error: &ParseError);
}

/// Interactive source on stdin/stdout
pub struct TerminalSelection<R, W> {
    input: R,
    output: W,
}

impl TerminalSelection<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalSelection<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> SelectionSource for TerminalSelection<R, W> {
    fn present(&mut self, diff: &DiffSet) {
        let _ = writeln!(self.output, "{}", "Files with different sizes:".bold());
        for (i, entry) in diff.iter().enumerate() {
            let _ = writeln!(
                self.output,
                "{:>4}. {} - Local size: {} bytes, Remote size: {} bytes",
                i + 1,
                entry.filename.as_str().cyan(),
                entry.local_size,
                entry.remote_size
            );
        }
    }

    fn next_expression(&mut self) -> io::Result<Option<String>> {
        write!(
            self.output,
            "Enter the numbers of the files you want to download (e.g., 1-5,6-10), or 'all' to download all files: "
        )?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn reject(&mut self, error: &ParseError) {
        let _ = writeln!(
            self.output,
            "{} {}. Please enter a valid range or 'all'.",
            "Invalid input:".red(),
            error
        );
    }
}

/// Replays a fixed list of expressions, recording what was shown and refused
#[derive(Debug, Default)]
pub struct ScriptedSelection {
    script: VecDeque<String>,
    pub presented: Vec<usize>,
    pub rejected: Vec<ParseError>,
}

impl ScriptedSelection {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            presented: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl SelectionSource for ScriptedSelection {
    fn present(&mut self, diff: &DiffSet) {
        self.presented.push(diff.len());
    }

    fn next_expression(&mut self) -> io::Result<Option<String>> {
        Ok(self.script.pop_front())
    }

    fn reject(&mut self, error: &ParseError) {
        self.rejected.push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::fs_enum::LocalEntry;
    use crate::remote::{RemoteFile, RemoteManifest};

    fn six_entry_diff() -> DiffSet {
        let names = ["f1", "f2", "f3", "f4", "f5", "f6"];
        let local: Vec<LocalEntry> = names
            .iter()
            .map(|n| LocalEntry { path: PathBuf::from(format!("/l/{n}")), size: 1 })
            .collect();
        let remote: RemoteManifest = names
            .iter()
            .map(|n| (*n, RemoteFile { size: 2, path: format!("/r/{n}") }))
            .collect();
        diff(&local, &remote)
    }

    #[test]
    fn test_all_selects_every_entry_once() {
        let set = six_entry_diff();
        let requests = parse_selection("all", &set, Path::new("/l")).unwrap();
        assert_eq!(requests.len(), 6);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.remote_source, format!("/r/f{}", i + 1));
            assert_eq!(request.local_destination, PathBuf::from(format!("/l/f{}", i + 1)));
        }
        assert_eq!(parse_positions("ALL", 6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(parse_positions("  All \n", 6).unwrap().len(), 6);
    }

    #[test]
    fn test_ranges_and_singles() {
        assert_eq!(parse_positions("1-3,5", 6).unwrap(), vec![1, 2, 3, 5]);
        assert_eq!(parse_positions(" 2 , 4 - 6 ", 6).unwrap(), vec![2, 4, 5, 6]);
        assert_eq!(parse_positions("3-3", 6).unwrap(), vec![3]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        assert_eq!(parse_positions("1,1-2", 6).unwrap(), vec![1, 1, 2]);
        let set = six_entry_diff();
        let requests = parse_selection("2,2", &set, Path::new("/l")).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(parse_positions("0", 6), Err(ParseError::OutOfRange { index: 0, len: 6 }));
        assert_eq!(parse_positions("7", 6), Err(ParseError::OutOfRange { index: 7, len: 6 }));
        assert_eq!(parse_positions("5-7", 6), Err(ParseError::OutOfRange { index: 7, len: 6 }));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(parse_positions("abc", 6), Err(ParseError::InvalidToken(_))));
        assert!(matches!(parse_positions("1,,2", 6), Err(ParseError::InvalidToken(_))));
        assert!(matches!(parse_positions("1,", 6), Err(ParseError::InvalidToken(_))));
        assert!(matches!(parse_positions("-1", 6), Err(ParseError::InvalidToken(_))));
        assert!(matches!(parse_positions("1-2-3", 6), Err(ParseError::InvalidToken(_))));
        assert!(matches!(parse_positions("a-3", 6), Err(ParseError::InvalidToken(_))));
        assert!(matches!(parse_positions("+2", 6), Err(ParseError::InvalidToken(_))));
        assert_eq!(parse_positions("", 6), Err(ParseError::Empty));
        assert_eq!(parse_positions("   ", 6), Err(ParseError::Empty));
    }

    #[test]
    fn test_reversed_range() {
        assert_eq!(
            parse_positions("3-1", 6),
            Err(ParseError::ReversedRange { start: 3, end: 1 })
        );
    }

    #[test]
    fn test_one_bad_token_rejects_everything() {
        let set = six_entry_diff();
        assert!(parse_selection("1,2,9", &set, Path::new("/l")).is_err());
    }

    #[test]
    fn test_terminal_selection_reads_lines() {
        let set = six_entry_diff();
        let mut output = Vec::new();
        {
            let mut source = TerminalSelection::new(&b"1-2\r\nall\n"[..], &mut output);
            source.present(&set);
            assert_eq!(source.next_expression().unwrap().as_deref(), Some("1-2"));
            assert_eq!(source.next_expression().unwrap().as_deref(), Some("all"));
            assert_eq!(source.next_expression().unwrap(), None);
        }
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("1. "));
        assert!(text.contains("Local size: 1 bytes, Remote size: 2 bytes"));
        assert!(text.contains("or 'all' to download all files"));
    }
}
