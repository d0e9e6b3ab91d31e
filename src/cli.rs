// src/cli.rs
//! CLI definitions for drvpkg
//!
//! The run itself lives in the library; `main` only turns these arguments
//! into assembler options.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "drvpkg")]
#[command(author = "drvpkg Contributors")]
#[command(version, disable_version_flag = true)]
#[command(about = "Build Debian packages for the AMI driver and tool", long_about = None)]
pub struct Cli {
    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: Option<bool>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the DKMS driver source package
    Driver {
        #[command(flatten)]
        common: CommonArgs,

        /// Skip the driver compilation confidence check
        #[arg(short = 'n', long)]
        no_driver: bool,
    },

    /// Build the ami_tool package
    Tool {
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Driver { common, .. } | Self::Tool { common } => common,
        }
    }
}

/// Options shared by both flavors
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Output directory (default: ./output/<YYYY-MM-DD_HH-MM-SS>)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Package release (default: YYYYMMDD)
    #[arg(short = 'r', long)]
    pub pkg_release: Option<String>,

    /// Debug-level logging
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Remove the output directory if it exists
    #[arg(short, long)]
    pub force: bool,

    /// Skip the version generation scripts
    #[arg(short = 'g', long)]
    pub no_gen_version: bool,

    /// Project checkout
    #[arg(short, long, default_value = ".")]
    pub project_dir: PathBuf,

    /// TOML file overriding the built-in configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_driver_flags() {
        let cli = Cli::try_parse_from([
            "drvpkg", "driver", "-f", "-n", "-g", "-r", "3", "-o", "/tmp/out",
        ])
        .unwrap();
        match &cli.command {
            Commands::Driver { common, no_driver } => {
                assert!(*no_driver);
                assert!(common.force);
                assert!(common.no_gen_version);
                assert_eq!(common.pkg_release.as_deref(), Some("3"));
                assert_eq!(common.output_dir, Some(PathBuf::from("/tmp/out")));
                assert_eq!(common.project_dir, PathBuf::from("."));
            }
            Commands::Tool { .. } => panic!("expected driver"),
        }
    }

    #[test]
    fn test_tool_rejects_no_driver() {
        assert!(Cli::try_parse_from(["drvpkg", "tool", "-n"]).is_err());
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["drvpkg", "-v"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_verbose_is_uppercase() {
        let cli = Cli::try_parse_from(["drvpkg", "tool", "-V"]).unwrap();
        assert!(cli.command.common().verbose);
    }
}
