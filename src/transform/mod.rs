//! Code transformation
//!
//! Picks the loaders for a file from the descriptor's rules, runs them in
//! phase order, then rewrites ES module syntax so the bundle runtime can
//! link the result. A step that reprints code returns a map, which is
//! composed with whatever map the input already carried.

pub mod esm;
mod source_map_loader;
mod typescript;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{BuildDescriptor, Enforce, LoaderKind};
use crate::error::{BuildError, Result};
use crate::sourcemap::SourceMap;

pub use esm::ExportBinding;

/// Extensions bundled as-is when no rule claims them
const PASS_THROUGH: &[&str] = &["js", "mjs", "cjs", "json"];

/// Phases in execution order
const PHASES: [Option<Enforce>; 3] = [Some(Enforce::Pre), None, Some(Enforce::Post)];

/// A loader selected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep {
    /// Index in `module.rules`; `None` for built-in steps
    pub rule: Option<usize>,
    pub loader: LoaderKind,
    pub phase: Option<Enforce>,
}

/// Ordered loaders for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformPlan {
    pub steps: Vec<PlannedStep>,
}

impl TransformPlan {
    /// Whether the last step produces JavaScript that needs module interop
    fn emits_script(&self) -> bool {
        !matches!(
            self.steps.last().map(|s| s.loader),
            Some(LoaderKind::Json) | Some(LoaderKind::Raw)
        )
    }
}

/// A transformed module, ready to be linked
#[derive(Debug, Clone)]
pub struct ModuleOutput {
    pub code: String,
    /// Map inherited from the input file, if a loader found one
    pub input_map: Option<SourceMap>,
    /// Module requests in source order
    pub requests: Vec<String>,
    pub exports: Vec<ExportBinding>,
    pub is_esm: bool,
}

/// Rule-driven transformer
pub struct Transformer {
    descriptor: Arc<BuildDescriptor>,
}

impl Transformer {
    pub fn new(descriptor: Arc<BuildDescriptor>) -> Self {
        Self { descriptor }
    }

    /// Select the loaders for `path`: the first matching rule of each phase
    pub fn select_transform(&self, path: &Path) -> Result<TransformPlan> {
        let mut plan = TransformPlan::default();
        for phase in PHASES {
            let selected = self
                .descriptor
                .rules_in_phase(phase)
                .find(|rule| rule.matches(path));
            match selected {
                Some(rule) => plan.steps.push(PlannedStep {
                    rule: Some(rule.index),
                    loader: rule.loader,
                    phase,
                }),
                None if phase.is_none() && extension(path) == Some("json") => {
                    plan.steps.push(PlannedStep {
                        rule: None,
                        loader: LoaderKind::Json,
                        phase,
                    })
                }
                None => {}
            }
        }

        let pass_through = extension(path)
            .map(|ext| PASS_THROUGH.contains(&ext))
            .unwrap_or(false);
        if plan.steps.is_empty() && !pass_through {
            return Err(BuildError::UnsupportedFile {
                path: path.to_path_buf(),
            });
        }

        debug!(
            "Plan for {}: {:?}",
            path.display(),
            plan.steps.iter().map(|s| s.loader.name()).collect::<Vec<_>>()
        );
        Ok(plan)
    }

    /// Run the selected loaders over `source`, then module interop
    pub fn transform(&self, path: &Path, source: &str) -> Result<ModuleOutput> {
        let plan = self.select_transform(path)?;
        let mut code = source.to_string();
        let mut input_map = None;

        for step in &plan.steps {
            let fail = |message: String| BuildError::Loader {
                path: path.to_path_buf(),
                loader: step.loader.name(),
                rule: step.rule.unwrap_or(0),
                message,
            };

            code = match step.loader {
                LoaderKind::TypeScript => {
                    let compiled = typescript::compile(&code, path).map_err(fail)?;
                    input_map = Some(match input_map.take() {
                        Some(previous) => compiled.map.compose(&previous),
                        None => compiled.map,
                    });
                    compiled.code
                }
                LoaderKind::SourceMap => {
                    let extracted = source_map_loader::extract(&code, path);
                    if let Some(warning) = extracted.warning {
                        warn!("{}: {}", path.display(), warning);
                    }
                    if extracted.map.is_some() {
                        input_map = extracted.map;
                    }
                    extracted.code
                }
                LoaderKind::Json => transform_json(&code).map_err(fail)?,
                LoaderKind::Raw => transform_raw(&code),
            };
        }

        if !plan.emits_script() {
            return Ok(ModuleOutput {
                code,
                input_map,
                requests: Vec::new(),
                exports: Vec::new(),
                is_esm: false,
            });
        }

        let interop = esm::to_commonjs(&code).map_err(|message| BuildError::Interop {
            path: path.to_path_buf(),
            message,
        })?;

        Ok(ModuleOutput {
            code: interop.code,
            input_map,
            requests: interop.requests,
            exports: interop.exports,
            is_esm: interop.is_esm,
        })
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// JSON module: validated, then assigned to `module.exports`
fn transform_json(source: &str) -> std::result::Result<String, String> {
    serde_json::from_str::<serde_json::Value>(source).map_err(|e| format!("invalid JSON: {}", e))?;
    let body = source.trim_end();
    let newlines = source[body.len()..].matches('\n').count();
    Ok(format!("module.exports = {};{}", body, "\n".repeat(newlines)))
}

/// Raw module: the file content as a string, padded to the original line count
fn transform_raw(source: &str) -> String {
    // A serialized string cannot fail to encode
    let literal = serde_json::to_string(source).unwrap_or_else(|_| "\"\"".to_string());
    let mut code = format!("module.exports = {};", literal);
    code.extend(std::iter::repeat('\n').take(source.matches('\n').count()));
    code
}
