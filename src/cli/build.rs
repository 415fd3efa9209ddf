//! Build command implementation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::bundler::{BuildResult, Bundler};
use crate::config::{lint, BuildDescriptor, Config, Devtool, Severity};
use crate::utils::{format_duration, format_size};
use crate::watch;

/// Build every configured artifact
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output directory (overrides output.path)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Source map mode: none, source-map, hidden-source-map or inline-source-map
    #[arg(long)]
    pub devtool: Option<Devtool>,

    /// Skip minification for every artifact
    #[arg(long)]
    pub no_minify: bool,

    /// Rebuild when a source file changes
    #[arg(short, long)]
    pub watch: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let (root, out_dir) = {
            let descriptor = load_descriptor(config_path)?;
            let out_dir = self
                .outdir
                .clone()
                .unwrap_or_else(|| descriptor.output.dir.clone());
            (descriptor.root.clone(), out_dir)
        };
        let out_dir = if out_dir.is_absolute() {
            out_dir
        } else {
            std::env::current_dir()?.join(out_dir)
        };

        let first = self.run_once(config_path).await;
        if !self.watch {
            return first.map(|_| ());
        }
        if let Err(err) = first {
            eprintln!("{} {:#}", "✗".red().bold(), err);
        }

        eprintln!(
            "{} Watching {} for changes (ctrl-c to stop)",
            "→".blue(),
            root.display().to_string().cyan()
        );
        watch::run(&root, &[out_dir], move || async move {
            if let Err(err) = self.run_once(config_path).await {
                eprintln!("{} {:#}", "✗".red().bold(), err);
            }
        })
        .await
    }

    /// Load a fresh descriptor and build once
    async fn run_once(&self, config_path: &str) -> Result<BuildResult> {
        let start = Instant::now();

        let descriptor = load_descriptor(config_path)?;
        for diagnostic in lint(&descriptor)
            .iter()
            .filter(|d| d.severity == Severity::Warning)
        {
            eprintln!("{} {}", "warning:".yellow().bold(), diagnostic.message);
        }

        eprintln!("{} Building...", "→".blue());

        let bundler = Bundler::new(descriptor, self.into())?;
        let result = bundler.build().await?;

        eprintln!(
            "\n{} Built {} artifact(s) in {}\n",
            "✓".green().bold(),
            result.artifacts.len(),
            format_duration(start.elapsed())
        );

        for artifact in &result.artifacts {
            eprintln!(
                "  {} {} {}{}",
                "•".dimmed(),
                artifact.output_path.display().to_string().cyan(),
                format_size(artifact.size).dimmed(),
                if artifact.minified {
                    " minified".dimmed().to_string()
                } else {
                    String::new()
                }
            );
            if let Some(map) = &artifact.sourcemap_path {
                eprintln!("    {} {}", "↳".dimmed(), map.display().to_string().dimmed());
            }
        }

        eprintln!();

        Ok(result)
    }
}

fn load_descriptor(config_path: &str) -> Result<Arc<BuildDescriptor>> {
    info!("Loading configuration from {}", config_path);
    let config = Config::load(config_path)?;
    Ok(Arc::new(BuildDescriptor::from_config(&config)?))
}

/// Build options derived from command arguments
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Replaces the configured output directory
    pub outdir: Option<PathBuf>,
    /// Replaces the configured devtool
    pub devtool: Option<Devtool>,
    /// `false` disables minification for every artifact
    pub minify: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            outdir: None,
            devtool: None,
            minify: true,
        }
    }
}

impl From<&BuildCommand> for BuildOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            outdir: cmd.outdir.clone(),
            devtool: cmd.devtool,
            minify: !cmd.no_minify,
        }
    }
}
