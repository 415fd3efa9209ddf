//! Configuration handling for umdpack
//!
//! Parses `umdpack.toml`, then normalizes it into the immutable
//! [`BuildDescriptor`] every later stage reads from.

mod descriptor;
mod lint;
mod pattern;
mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BuildError, Result};

pub use descriptor::*;
pub use lint::{lint, Diagnostic, Severity};
pub use pattern::{Pattern, PatternConfig};
pub use schema::*;

/// Default config file name
pub const CONFIG_FILE: &str = "umdpack.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source map strategy
    #[serde(default)]
    pub devtool: Devtool,

    /// Entry points, keyed by artifact name, in declaration order
    #[serde(default)]
    pub entry: IndexMap<String, EntryConfig>,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Module resolution
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Post-processing plugins
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Transform rules
    #[serde(default)]
    pub module: ModuleConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| BuildError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })?
                .join(path)
        };

        let content = fs::read_to_string(&canonical_path).map_err(|source| {
            BuildError::ConfigRead {
                path: canonical_path.clone(),
                source,
            }
        })?;

        let mut config = Self::parse(&content).map_err(|message| BuildError::ConfigParse {
            path: canonical_path.clone(),
            message,
        })?;

        // Set root directory to the directory containing the config file
        let parent = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        config.root = fs::canonicalize(&parent).unwrap_or(parent);

        debug!("Loaded {} entries from {}", config.entry.len(), canonical_path.display());

        Ok(config)
    }

    /// Parse configuration text; `root` is left empty
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Configuration that scaffolds a TypeScript UMD library
    pub fn library_template(library: &str, name: &str) -> Self {
        let mut entry = IndexMap::new();
        let request = "./source/index.ts".to_string();
        entry.insert(name.to_string(), EntryConfig::Path(request.clone()));
        entry.insert(format!("{}.min", name), EntryConfig::Path(request));

        let mut options = toml::Table::new();
        options.insert("include".to_string(), toml::Value::String("*.min.js".to_string()));

        Self {
            entry,
            output: OutputConfig {
                path: "build".to_string(),
                filename: "[name].js".to_string(),
                library_target: LibraryTarget::Umd,
                library: Some(library.to_string()),
                umd_named_define: true,
                manifest: false,
            },
            resolve: ResolveConfig {
                extensions: vec![".ts".to_string(), ".js".to_string()],
            },
            devtool: Devtool::SourceMap,
            plugins: vec![PluginConfig {
                name: "minify".to_string(),
                options: Some(options),
            }],
            module: ModuleConfig {
                rules: vec![
                    RuleConfig {
                        test: PatternConfig::glob("*.ts"),
                        exclude: None,
                        loader: LoaderKind::TypeScript,
                        enforce: None,
                    },
                    RuleConfig {
                        test: PatternConfig::glob("*.js"),
                        exclude: None,
                        loader: LoaderKind::SourceMap,
                        enforce: Some(Enforce::Pre),
                    },
                ],
            },
            root: PathBuf::from("."),
        }
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.path)
    }
}
