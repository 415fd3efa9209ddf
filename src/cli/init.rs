//! Project initialization command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::{Config, CONFIG_FILE};

/// Initialize a new library project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Global name the library registers under
    #[arg(short, long, default_value = "Library")]
    pub library: String,

    /// Artifact base name (defaults to the lowercased library name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Overwrite an existing umdpack.toml
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = self.dir.as_path();
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| self.library.to_lowercase());

        eprintln!(
            "{} Initializing library {}...\n",
            "→".blue(),
            self.library.cyan()
        );

        fs::create_dir_all(project_dir).context("Failed to create project directory")?;

        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() && !self.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        fs::write(&config_path, generate_config(&self.library, &name)?)
            .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;
        eprintln!("  {} Created {}", "✓".green(), CONFIG_FILE.cyan());

        if write_if_missing(&project_dir.join("source/index.ts"), &generate_entry(&self.library))? {
            eprintln!("  {} Created {}", "✓".green(), "source/index.ts".cyan());
        }

        eprintln!(
            "\n{} Project initialized successfully!\n",
            "✓".green().bold()
        );

        eprintln!("  Next steps:");
        if project_dir != Path::new(".") {
            eprintln!(
                "    {} cd {}",
                "→".dimmed(),
                project_dir.display().to_string().cyan()
            );
        }
        eprintln!("    {} umdpack build", "→".dimmed());
        eprintln!();

        Ok(())
    }
}

fn generate_config(library: &str, name: &str) -> Result<String> {
    let config = Config::library_template(library, name);
    let body = toml::to_string(&config).context("Failed to serialize configuration")?;
    Ok(format!(
        "# umdpack configuration\n# `umdpack check` validates this file, `umdpack build` runs it.\n\n{}",
        body
    ))
}

fn generate_entry(library: &str) -> String {
    format!(
        r#"export interface Greeting {{
  target: string;
}}

export const name: string = "{library}";

export function greet(greeting: Greeting): string {{
  return `Hello, ${{greeting.target}}!`;
}}
"#,
        library = library
    )
}

/// Write `contents` unless `path` exists; returns whether it wrote
fn write_if_missing(path: &Path, contents: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
