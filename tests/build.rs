//! End-to-end builds through the library API

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use umdpack_lib::sourcemap::SourceMap;
use umdpack_lib::{BuildDescriptor, BuildError, BuildOptions, Bundler, Config};

const INDEX_TS: &str = r#"import { shout } from "./util";
import { vendor } from "../lib/vendor";

export interface Greeting {
  target: string;
}

export function greet(greeting: Greeting): string {
  return shout(`Hello, ${greeting.target}!`) + vendor();
}
"#;

const UTIL_TS: &str = r#"// Shared helpers
export function shout(text: string): string {
  return text.toUpperCase();
}
"#;

const VENDOR_JS: &str = r#"exports.vendor = function () {
  return "!";
};
//# sourceMappingURL=vendor.js.map
"#;

const VENDOR_MAP: &str =
    r#"{"version":3,"sources":["../vendor-src/vendor.ts"],"names":[],"mappings":"AAAA;AACA;AACA"}"#;

/// A beam-style library project; returns the canonical project root
fn beam_project(dir: &Path, edit: impl FnOnce(&mut Config)) -> PathBuf {
    let root = fs::canonicalize(dir).unwrap();
    fs::create_dir_all(root.join("source")).unwrap();
    fs::create_dir_all(root.join("lib")).unwrap();
    fs::write(root.join("source/index.ts"), INDEX_TS).unwrap();
    fs::write(root.join("source/util.ts"), UTIL_TS).unwrap();
    fs::write(root.join("lib/vendor.js"), VENDOR_JS).unwrap();
    fs::write(root.join("lib/vendor.js.map"), VENDOR_MAP).unwrap();

    let mut config = Config::library_template("Beam", "beam");
    edit(&mut config);
    fs::write(root.join("umdpack.toml"), toml::to_string(&config).unwrap()).unwrap();
    root
}

async fn build(root: &Path, options: BuildOptions) -> umdpack_lib::Result<umdpack_lib::BuildResult> {
    let config = Config::load(root.join("umdpack.toml"))?;
    let descriptor = Arc::new(BuildDescriptor::from_config(&config)?);
    Bundler::new(descriptor, options)?.build().await
}

fn line_of(code: &str, needle: &str) -> u32 {
    code.lines().position(|l| l.contains(needle)).unwrap() as u32
}

/// Generated line and column of the last occurrence of `needle`
fn position_of(code: &str, needle: &str) -> (u32, u32) {
    let offset = code.rfind(needle).unwrap();
    let before = &code[..offset];
    let line = before.matches('\n').count() as u32;
    let column = before.rfind('\n').map_or(offset, |newline| offset - newline - 1) as u32;
    (line, column)
}

#[tokio::test]
async fn test_beam_builds_plain_and_minified_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let root = beam_project(dir.path(), |_| {});

    let result = build(&root, BuildOptions::default()).await.unwrap();
    let names: Vec<(&str, bool)> = result
        .artifacts
        .iter()
        .map(|a| (a.name.as_str(), a.minified))
        .collect();
    assert_eq!(names, vec![("beam", false), ("beam.min", true)]);
    assert_eq!(result.modules.len(), 3);

    let out = root.join("build");
    let plain = fs::read_to_string(out.join("beam.js")).unwrap();
    let minified = fs::read_to_string(out.join("beam.min.js")).unwrap();

    assert!(plain.contains("define(\"Beam\", [], factory);"));
    assert!(plain.contains("// source/index.ts"));
    assert!(!plain.contains("interface"));
    assert!(!plain.contains(": string"));
    assert!(plain.ends_with("//# sourceMappingURL=beam.js.map\n"));

    assert!(!minified.contains("// source/index.ts"));
    assert!(!minified.contains("Shared helpers"));
    assert!(minified.contains("define(\"Beam\",[]"));
    assert!(minified.ends_with("//# sourceMappingURL=beam.min.js.map\n"));
    assert!(minified.len() < plain.len());

    for (code, map_file) in [(&plain, "beam.js.map"), (&minified, "beam.min.js.map")] {
        let map = SourceMap::from_json(&fs::read_to_string(out.join(map_file)).unwrap()).unwrap();
        assert_eq!(
            map.sources,
            vec![
                "../source/index.ts",
                "../source/util.ts",
                "../vendor-src/vendor.ts"
            ]
        );
        assert_eq!(map.sources_content[0].as_deref(), Some(INDEX_TS));

        let (line, column) = position_of(code, "Hello, ");
        let greet = map.lookup(line, column).unwrap();
        assert_eq!((greet.source, greet.original_line), (0, 8));

        let (line, column) = position_of(code, "toUpperCase");
        let shout = map.lookup(line, column).unwrap();
        assert_eq!((shout.source, shout.original_line), (1, 2));

        let (line, column) = position_of(code, "\"!\"");
        let vendor = map.lookup(line, column).unwrap();
        assert_eq!((vendor.source, vendor.original_line), (2, 1));
    }

    let plain_map = SourceMap::from_json(&fs::read_to_string(out.join("beam.js.map")).unwrap()).unwrap();
    let greet = plain_map.lookup_line(line_of(&plain, "function greet(")).unwrap();
    assert_eq!((greet.source, greet.original_line), (0, 7));
}

#[tokio::test]
async fn test_cyclic_imports_read_live_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let root = beam_project(dir.path(), |_| {});
    fs::write(
        root.join("source/index.ts"),
        "import { count, bump } from \"./counter\";\n\nexport function current(): number {\n  return count;\n}\n\nexport { bump };\n",
    )
    .unwrap();
    fs::write(
        root.join("source/counter.ts"),
        "import { current } from \"./index\";\n\nexport let count = 0;\n\nexport function bump(): number {\n  count += 1;\n  return current();\n}\n",
    )
    .unwrap();

    let result = build(&root, BuildOptions::default()).await.unwrap();
    assert_eq!(result.modules.len(), 2);

    let plain = fs::read_to_string(root.join("build/beam.js")).unwrap();
    assert!(plain.contains("return __umdpack_import_0__.count;"));
    assert!(plain.contains("return (0, __umdpack_import_0__.current)();"));
    assert!(plain.contains("get: function () { return __umdpack_import_0__.bump; }"));
    assert!(!plain.contains("var count = "));
}

#[tokio::test]
async fn test_unsupported_file_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = beam_project(dir.path(), |_| {});
    fs::write(root.join("source/style.css"), "body {}").unwrap();
    fs::write(
        root.join("source/index.ts"),
        format!("import \"./style.css\";\n{}", INDEX_TS),
    )
    .unwrap();

    let err = build(&root, BuildOptions::default()).await.unwrap_err();
    match err {
        BuildError::UnsupportedFile { path } => assert!(path.ends_with("source/style.css")),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!root.join("build").exists());
}

#[tokio::test]
async fn test_missing_import_is_resolution_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = beam_project(dir.path(), |_| {});
    fs::remove_file(root.join("source/util.ts")).unwrap();

    let err = build(&root, BuildOptions::default()).await.unwrap_err();
    assert!(matches!(err, BuildError::Resolution { ref request, .. } if request == "./util"));
    assert!(!root.join("build").exists());
}

#[tokio::test]
async fn test_no_minify_override_and_inline_maps() {
    let dir = tempfile::tempdir().unwrap();
    let root = beam_project(dir.path(), |_| {});
    let options = BuildOptions {
        minify: false,
        devtool: Some(umdpack_lib::config::Devtool::InlineSourceMap),
        ..Default::default()
    };

    let result = build(&root, options).await.unwrap();
    assert!(result.artifacts.iter().all(|a| !a.minified));
    assert!(result.artifacts.iter().all(|a| a.sourcemap_path.is_none()));

    let min = fs::read_to_string(root.join("build/beam.min.js")).unwrap();
    assert!(min.contains("// source/index.ts"));
    assert!(min.contains("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    assert!(!root.join("build/beam.min.js.map").exists());
}

#[tokio::test]
async fn test_content_hash_filenames_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = beam_project(dir.path(), |config| {
        config.output.filename = "[name].[contenthash:8].js".to_string();
        config.output.manifest = true;
    });

    let result = build(&root, BuildOptions::default()).await.unwrap();
    let manifest: std::collections::BTreeMap<String, String> =
        serde_json::from_str(&fs::read_to_string(root.join("build/manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest, result.manifest);

    let plain = &manifest["beam"];
    assert!(plain.starts_with("beam.") && plain.ends_with(".js"));
    assert_eq!(plain.len(), "beam.".len() + 8 + ".js".len());
    assert!(root.join("build").join(plain).exists());
    assert!(root.join("build").join(format!("{}.map", plain)).exists());

    // Same input, same output
    let again = build(&root, BuildOptions::default()).await.unwrap();
    assert_eq!(again.manifest, result.manifest);
}
