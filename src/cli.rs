//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Clone, Debug, Parser)]
#[command(
    author,
    version,
    about = "Synchronize files based on size differences."
)]
pub struct Args {
    /// Local directory path
    #[arg(long = "local-path")]
    pub local_path: PathBuf,

    /// Remote directory path (absolute, or `~/...` for the remote home)
    #[arg(long = "remote-path")]
    pub remote_path: String,

    /// Connection settings (.toml, or .json) [default: ~/.config/sizesync/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Append one line per transfer event to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_paths_required() {
        assert!(Args::try_parse_from(["sizesync", "--local-path", "/l"]).is_err());
        assert!(Args::try_parse_from(["sizesync", "--remote-path", "/r"]).is_err());
    }

    #[test]
    fn parses_all_flags() {
        let args = Args::try_parse_from([
            "sizesync",
            "--local-path",
            "/data",
            "--remote-path",
            "/srv/data",
            "--config",
            "cfg.json",
            "--log-file",
            "sync.log",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.local_path, PathBuf::from("/data"));
        assert_eq!(args.remote_path, "/srv/data");
        assert_eq!(args.config, Some(PathBuf::from("cfg.json")));
        assert_eq!(args.log_file, Some(PathBuf::from("sync.log")));
        assert!(args.verbose);
    }
}
