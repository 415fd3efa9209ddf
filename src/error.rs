//! Error types for configuration, resolution, transformation and output.
//!
//! Every variant is fatal to a build. Each one carries the file path and the
//! rule or stage that triggered it so the CLI can report it verbatim.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    // Configuration loading
    #[error("failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    // Module resolution
    #[error("cannot resolve '{request}' from {} (tried: {})", importer.display(), display_paths(tried))]
    Resolution {
        request: String,
        importer: PathBuf,
        tried: Vec<PathBuf>,
    },

    // Transformation
    #[error("no transform rule matches {} and it is not a pass-through file type", path.display())]
    UnsupportedFile { path: PathBuf },

    #[error("{loader} loader (rule #{rule}) failed on {}: {message}", path.display())]
    Loader {
        path: PathBuf,
        loader: &'static str,
        rule: usize,
        message: String,
    },

    #[error("cannot rewrite module syntax in {}: {message}", path.display())]
    Interop { path: PathBuf, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Optimization
    #[error("plugin `{plugin}` failed on {artifact}: {message}")]
    Plugin {
        plugin: String,
        artifact: String,
        message: String,
    },

    // Output
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn plugin(
        plugin: impl Into<String>,
        artifact: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
