//! Minification through `oxc_minifier`
//!
//! Compresses and mangles a rendered artifact, then prints it with
//! `oxc_codegen`. The printer's map points into the unminified artifact and
//! is composed with the artifact's own map.

use std::path::Path;

use async_trait::async_trait;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions, CodegenReturn};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use tracing::debug;

use super::{Asset, Plugin};
use crate::error::{BuildError, Result};
use crate::sourcemap::SourceMap;

/// Minified code and the map back to its input
#[derive(Debug, Clone)]
pub struct Minified {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// Minify an artifact; `filename` names the input in the returned map
pub fn minify(source: &str, filename: &str) -> std::result::Result<Minified, String> {
    let allocator = Allocator::default();
    // artifacts are scripts: the UMD prologue reads a top-level `this`
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(error.to_string());
    }
    if parsed.panicked {
        return Err("parser gave up".to_string());
    }
    let mut program = parsed.program;

    let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);
    let CodegenReturn { code, map, .. } = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(Path::new(filename).to_path_buf()),
            ..CodegenOptions::minify()
        })
        .with_scoping(minified.scoping)
        .build(&program);

    let map = map.map(|map| SourceMap::from_oxc(&map)).transpose()?;
    debug!("Minified {}: {} -> {} bytes", filename, source.len(), code.len());
    Ok(Minified { code, map })
}

/// Minify plugin
pub struct MinifyPlugin {
    keep_map: bool,
}

impl MinifyPlugin {
    pub fn new(keep_map: bool) -> Self {
        Self { keep_map }
    }
}

#[async_trait]
impl Plugin for MinifyPlugin {
    fn name(&self) -> &str {
        "minify"
    }

    fn applies_to(&self, asset: &Asset) -> bool {
        asset.minify
    }

    async fn process(&self, asset: &mut Asset) -> Result<()> {
        let minified = minify(&asset.code, &asset.filename)
            .map_err(|message| BuildError::plugin(self.name(), &asset.filename, message))?;

        asset.map = match (self.keep_map, asset.map.take(), minified.map) {
            (true, Some(original), Some(minified)) => Some(minified.compose(&original)),
            _ => None,
        };
        asset.code = minified.code;
        Ok(())
    }
}
