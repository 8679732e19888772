// Command line arguments.
// Global flags plus the tree, show and cache subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::github::RepoRef;

/// Command-line arguments for the grove binary.
#[derive(Debug, Parser)]
#[command(name = "grove", version, about = "Browse GitHub repositories with a local cache")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "GROVE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    /// Override the cache directory.
    #[arg(long = "cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List the files of a repository.
    Tree(TreeArgs),
    /// Print one file, optionally as highlighted HTML.
    Show(ShowArgs),
    /// Cache maintenance.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Clone)]
pub struct TreeArgs {
    /// Repository as owner/repo, optionally followed by @ref.
    #[arg(value_name = "REPO")]
    pub repo: RepoRef,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Repository as owner/repo, optionally followed by @ref.
    #[arg(value_name = "REPO")]
    pub repo: RepoRef,

    /// Path of the file within the repository.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Print highlighted HTML instead of plain text.
    #[arg(long)]
    pub highlight: bool,

    /// Language token; defaults to the file extension.
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Highlight theme; defaults to the configured theme.
    #[arg(long, value_name = "THEME")]
    pub theme: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Evict the oldest entries beyond each namespace's limit.
    Prune,
    /// Remove every cached entry.
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_show() {
        let args = CliArgs::try_parse_from([
            "grove",
            "--log-level",
            "debug",
            "show",
            "octo/hello@dev",
            "src/lib.rs",
            "--highlight",
            "--theme",
            "base16-ocean.dark",
        ])
        .unwrap();

        assert_eq!(args.log_level.as_deref(), Some("debug"));
        let Command::Show(show) = args.command else {
            panic!("expected show");
        };
        assert_eq!(show.repo, RepoRef::new("octo", "hello", "dev"));
        assert_eq!(show.path, "src/lib.rs");
        assert!(show.highlight);
        assert_eq!(show.language, None);
        assert_eq!(show.theme.as_deref(), Some("base16-ocean.dark"));
    }

    #[test]
    fn test_parse_cache_clear() {
        let args = CliArgs::try_parse_from(["grove", "cache", "clear"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Cache(CacheArgs {
                command: CacheCommand::Clear
            })
        ));
    }

    #[test]
    fn test_invalid_repo_is_rejected() {
        assert!(CliArgs::try_parse_from(["grove", "tree", "not-a-repo"]).is_err());
    }
}
