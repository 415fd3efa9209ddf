//! Plugin system for umdpack
//!
//! Plugins post-process rendered artifacts in declaration order. Each one
//! decides whether an artifact concerns it and keeps the artifact's source
//! map in step with the code it rewrites.

mod banner;
mod minify;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{BuildDescriptor, MINIFY_PLUGIN_NAMES};
use crate::error::{BuildError, Result};
use crate::sourcemap::SourceMap;

pub use banner::BannerPlugin;
pub use minify::{minify, Minified, MinifyPlugin};

/// A rendered artifact on its way to the output directory
#[derive(Debug, Clone)]
pub struct Asset {
    /// Entry name
    pub name: String,
    /// Preview filename, hash placeholders zeroed
    pub filename: String,
    /// Whether the optimization step applies
    pub minify: bool,
    pub code: String,
    pub map: Option<SourceMap>,
}

/// Plugin trait - implement this to post-process artifacts
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for logging and errors
    fn name(&self) -> &str;

    /// Whether this plugin processes `asset`
    fn applies_to(&self, _asset: &Asset) -> bool {
        true
    }

    /// Rewrite the asset in place
    async fn process(&self, asset: &mut Asset) -> Result<()>;
}

/// Plugin manager
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    /// Create an empty plugin manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate the configured plugins, in declaration order
    pub fn from_descriptor(descriptor: &BuildDescriptor) -> Result<Self> {
        let mut manager = Self::new();
        for config in &descriptor.plugins {
            let name = config.name.as_str();
            if MINIFY_PLUGIN_NAMES.contains(&name) {
                let keep_map = descriptor
                    .optimization
                    .as_ref()
                    .map(|rule| rule.source_map)
                    .unwrap_or(true);
                manager.register(Arc::new(MinifyPlugin::new(keep_map)));
            } else if name == "banner" {
                manager.register(Arc::new(BannerPlugin::from_config(config)?));
            } else {
                return Err(BuildError::config(format!("unknown plugin `{}`", name)));
            }
        }
        Ok(manager)
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Run every applicable plugin over `asset`
    pub async fn run(&self, asset: &mut Asset) -> Result<()> {
        for plugin in &self.plugins {
            if !plugin.applies_to(asset) {
                continue;
            }
            debug!("Running plugin {} on {}", plugin.name(), asset.filename);
            plugin.process(asset).await?;
        }
        Ok(())
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
