//! Command-line definitions

use clap::{Parser, Subcommand};
use ghmirror::sync::Resource;
use std::path::PathBuf;

/// ghmirror - Mirror GitHub organizations into a local document store
#[derive(Parser, Debug)]
#[command(name = "ghmirror")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/ghmirror/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at info level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull an organization's repositories into the store
    Sync {
        /// GitHub organization to mirror
        #[arg(short, long, env = "GH_ORGANIZATION")]
        organization: String,

        /// Only these repositories (`name` or `owner/name`, repeatable)
        #[arg(short, long = "repo")]
        repos: Vec<String>,

        /// Only these resources (repeatable or comma-separated)
        #[arg(long = "resource", value_enum, value_delimiter = ',')]
        resources: Vec<Resource>,
    },

    /// Receive webhook deliveries and keep the store current
    Serve {
        /// Address to bind (overrides webhook.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print a stored document by its canonical key
    Show {
        /// Canonical key, e.g. issues/acme/widgets/42
        key: String,
    },

    /// Count stored documents per collection
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_arguments() {
        let cli = Cli::parse_from([
            "ghmirror",
            "sync",
            "--organization",
            "acme",
            "--repo",
            "widgets",
            "-r",
            "acme/gears",
            "--resource",
            "issues,issue-events",
        ]);

        match cli.command {
            Commands::Sync {
                organization,
                repos,
                resources,
            } => {
                assert_eq!(organization, "acme");
                assert_eq!(repos, vec!["widgets", "acme/gears"]);
                assert_eq!(resources, vec![Resource::Issues, Resource::IssueEvents]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["ghmirror", "stats", "--config", "/tmp/mirror.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mirror.yaml")));
        assert!(matches!(cli.command, Commands::Stats));
    }
}
