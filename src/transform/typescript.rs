//! TypeScript compilation
//!
//! Parses with `oxc_parser`, strips types with `oxc_transformer` and prints
//! JavaScript with `oxc_codegen`, which also records where every printed
//! node came from. Types are erased, never checked.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions, CodegenReturn};
use oxc_parser::{Parser, ParserReturn};
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::sourcemap::SourceMap;

/// JavaScript produced from a TypeScript file
#[derive(Debug, Clone)]
pub struct Compiled {
    pub code: String,
    /// Maps `code` back to the TypeScript source
    pub map: SourceMap,
}

/// Compile `source`, read from `path`, to JavaScript
pub fn compile(source: &str, path: &Path) -> Result<Compiled, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path)
        .unwrap_or_else(|_| SourceType::ts())
        .with_typescript(true);

    let ParserReturn {
        mut program,
        errors,
        panicked,
        ..
    } = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = errors.first() {
        return Err(error.to_string());
    }
    if panicked {
        return Err("parser gave up".to_string());
    }

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let options = TransformOptions::default();
    let transformed = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if let Some(error) = transformed.errors.first() {
        return Err(error.to_string());
    }

    let CodegenReturn { code, map, .. } = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(path.to_path_buf()),
            ..CodegenOptions::default()
        })
        .build(&program);

    let map = match map {
        Some(map) => SourceMap::from_oxc(&map)?,
        None => SourceMap::identity(&path.to_string_lossy(), source),
    };
    Ok(Compiled { code, map })
}
