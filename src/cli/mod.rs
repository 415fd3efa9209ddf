//! Command-line interface for umdpack
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Bundle every entry, optionally rebuilding on change
//! - `check`: Validate and lint the configuration
//! - `init`: Scaffold a library project

mod build;
mod check;
mod init;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::config::CONFIG_FILE;

pub use build::{BuildCommand, BuildOptions};
pub use check::CheckCommand;
pub use init::InitCommand;

/// umdpack - package TypeScript and JavaScript libraries as UMD bundles
#[derive(Parser, Debug)]
#[command(name = "umdpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to umdpack.toml config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every configured artifact
    Build(BuildCommand),

    /// Validate the configuration and report likely mistakes
    Check(CheckCommand),

    /// Initialize a new library project
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Check(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the umdpack banner
fn print_banner() {
    eprintln!(
        "\n{} {}\n",
        "umdpack".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
