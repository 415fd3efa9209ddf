//! Core bundler implementation
//!
//! Builds the module graph from every entry, renders one artifact per entry,
//! runs the post-processing plugins and commits the output directory.

mod artifact;
mod graph;
mod output;
mod umd;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cli::BuildOptions;
use crate::config::{ArtifactPlan, BuildDescriptor, Devtool};
use crate::error::{BuildError, Result};
use crate::plugins::{Asset, PluginManager};
use crate::resolver::Resolver;
use crate::transform::Transformer;
use crate::utils::{hash_content, relative_path};

pub use graph::{Module, ModuleGraph, ModuleId};
pub use output::{OutputStage, StagedFile};

/// Result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    /// Generated artifacts, in entry order
    pub artifacts: Vec<ArtifactInfo>,

    /// Artifact name to final filename
    pub manifest: BTreeMap<String, String>,

    /// Every module file the build read
    pub modules: Vec<PathBuf>,
}

/// Information about a generated artifact
#[derive(Debug)]
pub struct ArtifactInfo {
    pub name: String,

    /// Output file path
    pub output_path: PathBuf,

    /// Artifact size in bytes
    pub size: usize,

    pub minified: bool,

    /// Source map path (if written to its own file)
    pub sourcemap_path: Option<PathBuf>,
}

/// The main bundler
pub struct Bundler {
    descriptor: Arc<BuildDescriptor>,

    /// Build options
    options: BuildOptions,

    /// Module resolver
    resolver: Resolver,

    /// Code transformer
    transformer: Transformer,

    plugins: PluginManager,

    /// Module graph
    graph: Arc<RwLock<ModuleGraph>>,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(descriptor: Arc<BuildDescriptor>, options: BuildOptions) -> Result<Self> {
        let resolver = Resolver::new(descriptor.clone());
        let transformer = Transformer::new(descriptor.clone());
        let plugins = PluginManager::from_descriptor(&descriptor)?;

        Ok(Self {
            descriptor,
            options,
            resolver,
            transformer,
            plugins,
            graph: Arc::new(RwLock::new(ModuleGraph::new())),
        })
    }

    /// Build the project; nothing is written unless every stage succeeds
    pub async fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();
        *self.graph.write() = ModuleGraph::new();

        // 1. Build the module graph from the entries, in declaration order
        info!("Building module graph...");
        let mut entry_ids = Vec::with_capacity(self.descriptor.entries.len());
        for entry in &self.descriptor.entries {
            let path = self.resolver.resolve_entry(entry)?;
            debug!("Processing entry: {} -> {}", entry.name, path.display());
            entry_ids.push(self.process_module(&path).await?);
        }

        // 2. Render and optimize each artifact
        let devtool = self.devtool();
        let mut stage = OutputStage::new(self.output_dir());
        let mut artifacts = Vec::new();
        let mut manifest = BTreeMap::new();

        for (plan, entry_id) in self.descriptor.artifacts().into_iter().zip(entry_ids) {
            let plan = ArtifactPlan {
                minify: plan.minify && self.options.minify,
                ..plan
            };
            info!("Rendering {}{}", plan.filename, if plan.minify { " (minified)" } else { "" });

            let mut asset = {
                let graph = self.graph.read();
                artifact::render(
                    &graph,
                    entry_id,
                    &plan,
                    &self.descriptor.output,
                    &self.descriptor.root,
                    devtool.emits_map(),
                )
            };
            self.plugins.run(&mut asset).await?;

            let info = self.finalize(asset, devtool, &mut stage);
            if let Some(filename) = info.output_path.file_name() {
                manifest.insert(info.name.clone(), filename.to_string_lossy().to_string());
            }
            artifacts.push(info);
        }

        // 3. Manifest
        if self.descriptor.output.manifest {
            let json = serde_json::to_string_pretty(&manifest).unwrap_or_else(|_| "{}".to_string());
            stage.stage("manifest.json", json);
        }

        // 4. Write everything
        info!("Writing {} file(s) to {}", stage.files().len(), stage.dir().display());
        stage.commit()?;

        let modules = self.graph.read().paths().map(Path::to_path_buf).collect();
        debug!("Build completed in {:?}", start.elapsed());

        Ok(BuildResult {
            artifacts,
            manifest,
            modules,
        })
    }

    /// Process a single module and its dependencies
    ///
    /// Uses Box::pin for async recursion to avoid infinite type size issues
    async fn process_module(&self, path: &Path) -> Result<ModuleId> {
        let canonical_path = fs::canonicalize(path).map_err(|source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        // Check if already processed
        let existing = self.graph.read().get_module_id(&canonical_path);
        if let Some(id) = existing {
            return Ok(id);
        }

        let source = fs::read_to_string(&canonical_path).map_err(|source| BuildError::Read {
            path: canonical_path.clone(),
            source,
        })?;

        let output = self.transformer.transform(&canonical_path, &source)?;
        let requests = output.requests.clone();

        let module = Module {
            path: canonical_path.clone(),
            source,
            code: output.code,
            input_map: output.input_map,
            exports: output.exports,
            is_esm: output.is_esm,
            dependencies: Vec::new(),
        };

        // Registered before its dependencies so ids follow discovery order
        let module_id = self.graph.write().add_module(module);

        for request in &requests {
            let resolved = self.resolver.resolve(request, &canonical_path)?;
            let dep_id = Box::pin(self.process_module(&resolved)).await?;
            self.graph.write().add_dependency(module_id, request, dep_id);
        }

        Ok(module_id)
    }

    /// Hash the asset, attach its source map and stage the files
    fn finalize(&self, mut asset: Asset, devtool: Devtool, stage: &mut OutputStage) -> ArtifactInfo {
        let hash = hash_content(asset.code.as_bytes());
        let filename = self.descriptor.output.filename.expand(&asset.name, Some(&hash));
        let output_path = stage.dir().join(&filename);
        let basename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.clone());
        let map_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| stage.dir().to_path_buf());

        let mut sourcemap_path = None;
        if let Some(mut map) = asset.map.take() {
            map.file = Some(basename.clone());
            map.map_sources(|source| relative_source(source, &map_dir));

            match devtool {
                Devtool::SourceMap | Devtool::HiddenSourceMap => {
                    if devtool == Devtool::SourceMap {
                        push_comment(&mut asset.code, &format!("{}.map", basename));
                    }
                    let map_name = format!("{}.map", filename);
                    sourcemap_path = Some(stage.dir().join(&map_name));
                    stage.stage(map_name, map.to_json());
                }
                Devtool::InlineSourceMap => push_comment(&mut asset.code, &map.to_data_url()),
                Devtool::None => {}
            }
        }

        let size = asset.code.len();
        stage.stage(filename, asset.code);

        ArtifactInfo {
            name: asset.name,
            output_path,
            size,
            minified: asset.minify,
            sourcemap_path,
        }
    }

    fn devtool(&self) -> Devtool {
        self.options.devtool.unwrap_or(self.descriptor.devtool)
    }

    fn output_dir(&self) -> PathBuf {
        self.options
            .outdir
            .clone()
            .unwrap_or_else(|| self.descriptor.output.dir.clone())
    }
}

fn push_comment(code: &mut String, url: &str) {
    if !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str(&format!("//# sourceMappingURL={}\n", url));
}

/// Express an absolute map source relative to the directory holding the map
fn relative_source(source: &str, map_dir: &Path) -> String {
    let path = Path::new(source);
    if source.contains("://") || !path.is_absolute() {
        return source.to_string();
    }
    relative_path(map_dir, path).unwrap_or_else(|| source.to_string())
}
