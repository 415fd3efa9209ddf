//! Check command: validate and lint the configuration without building

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use crate::config::{lint, BuildDescriptor, Config, Severity};

/// Validate the configuration and report likely mistakes
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

impl CheckCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let config = Config::load(config_path)?;
        let descriptor = std::sync::Arc::new(BuildDescriptor::from_config(&config)?);

        for artifact in descriptor.artifacts() {
            eprintln!(
                "  {} {} {} {}{}",
                "•".dimmed(),
                artifact.name,
                "→".dimmed(),
                artifact.filename.cyan(),
                if artifact.minify {
                    " (minified)".dimmed().to_string()
                } else {
                    String::new()
                }
            );
        }
        eprintln!();

        let diagnostics = lint(&descriptor);
        for diagnostic in &diagnostics {
            let label = match diagnostic.severity {
                Severity::Error => "error:".red().bold(),
                Severity::Warning => "warning:".yellow().bold(),
            };
            eprintln!("{} {}", label, diagnostic.message);
        }

        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error || self.strict)
            .count();
        if errors > 0 {
            bail!("{} problem(s) found in {}", errors, config_path);
        }

        eprintln!("{} {} is valid", "✓".green().bold(), config_path);
        Ok(())
    }
}
