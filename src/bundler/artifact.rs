//! Artifact rendering
//!
//! Lays out one artifact: library prologue, module runtime, one table entry
//! per reachable module, then the entry call and epilogue. Line offsets are
//! tracked while writing so each module's map lands on the lines its code
//! occupies.

use std::collections::BTreeMap;
use std::path::Path;

use super::graph::{ModuleGraph, ModuleId};
use super::umd;
use crate::config::{ArtifactPlan, OutputDescriptor};
use crate::plugins::Asset;
use crate::sourcemap::SourceMap;
use crate::transform::esm;
use crate::utils::{relative_path, to_slash};

/// Line-counting code buffer
#[derive(Default)]
struct Emitter {
    code: String,
    line: u32,
}

impl Emitter {
    fn push(&mut self, text: &str) {
        self.line += text.matches('\n').count() as u32;
        self.code.push_str(text);
    }
}

/// Render the artifact for `plan`, whose entry module is `entry`
pub fn render(
    graph: &ModuleGraph,
    entry: ModuleId,
    plan: &ArtifactPlan,
    output: &OutputDescriptor,
    root: &Path,
    with_map: bool,
) -> Asset {
    let mut out = Emitter::default();
    let mut map = SourceMap::new();

    out.push(&umd::prologue(output));
    out.push(&umd::runtime());

    for id in graph.reachable_from(entry) {
        let Some(module) = graph.get_module(id) else {
            continue;
        };

        let table: BTreeMap<&str, ModuleId> = module
            .dependencies
            .iter()
            .map(|(request, dep)| (request.as_str(), *dep))
            .collect();
        let table = serde_json::to_string(&table).unwrap_or_else(|_| "{}".to_string());

        let label = relative_path(root, &module.path).unwrap_or_else(|| to_slash(&module.path));
        out.push(&format!("// {}\n", label));
        out.push(&format!(
            "__umdpack_modules__[{}] = [function (module, exports, require) {{\n",
            id
        ));
        if module.is_esm {
            out.push(&esm::export_header(&module.exports));
            out.push("\n");
        }

        let start = out.line;
        out.push(&module.code);
        if !module.code.is_empty() && !module.code.ends_with('\n') {
            out.push("\n");
        }
        if with_map {
            let mut module_map = module.source_map(&to_slash(&module.path));
            module_map.lines.truncate(module.code.lines().count());
            map.append(&module_map, start);
        }

        out.push(&format!("}}, {}];\n", table));
    }

    out.push(&format!("return __umdpack_require__({});\n", entry));
    out.push(&umd::epilogue(output));

    Asset {
        name: plan.name.clone(),
        filename: plan.filename.clone(),
        minify: plan.minify,
        code: out.code,
        map: with_map.then_some(map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::graph::Module;
    use crate::config::{BuildDescriptor, Config};
    use crate::transform::ExportBinding;
    use std::path::PathBuf;

    fn module(path: &str, code: &str) -> Module {
        Module {
            path: PathBuf::from(path),
            source: code.to_string(),
            code: code.to_string(),
            input_map: None,
            exports: Vec::new(),
            is_esm: false,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_modules_land_on_mapped_lines() {
        let mut graph = ModuleGraph::new();
        let mut entry = module("/p/source/index.ts", "var util = require(\"./util\");\nutil.run();\n");
        entry.is_esm = true;
        entry.exports.push(ExportBinding {
            name: "run".to_string(),
            expr: "util.run".to_string(),
        });
        let a = graph.add_module(entry);
        let b = graph.add_module(module("/p/source/util.ts", "exports.run = function () {};"));
        graph.add_dependency(a, "./util", b);

        let descriptor = BuildDescriptor::from_config(&Config::library_template("Beam", "beam")).unwrap();
        let plan = &descriptor.artifacts()[0];
        let asset = render(&graph, a, plan, &descriptor.output, Path::new("/p"), true);

        let lines: Vec<&str> = asset.code.lines().collect();
        let map = asset.map.unwrap();
        assert_eq!(map.sources, vec!["/p/source/index.ts", "/p/source/util.ts"]);

        let first = lines
            .iter()
            .position(|l| *l == "var util = require(\"./util\");")
            .unwrap();
        assert_eq!(lines[first - 2], "__umdpack_modules__[0] = [function (module, exports, require) {");
        assert!(lines[first - 1].contains("get: function () { return util.run; }"));
        assert_eq!(lines[first - 3], "// source/index.ts");
        let segment = map.lookup_line(first as u32).unwrap();
        assert_eq!((segment.source, segment.original_line), (0, 0));
        assert_eq!(map.lookup_line(first as u32 + 1).unwrap().original_line, 1);
        assert!(map.lookup_line(first as u32 + 2).is_none());
        assert_eq!(lines[first + 2], "}, {\"./util\":1}];");

        let util = lines
            .iter()
            .position(|l| *l == "exports.run = function () {};")
            .unwrap();
        assert_eq!(map.lookup_line(util as u32).unwrap().source, 1);

        assert_eq!(lines[lines.len() - 2], "return __umdpack_require__(0);");
        assert_eq!(lines[lines.len() - 1], "});");
    }

    #[test]
    fn test_without_map() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(module("/p/a.js", "module.exports = 1;"));
        let descriptor = BuildDescriptor::from_config(&Config::library_template("Beam", "beam")).unwrap();
        let asset = render(&graph, a, &descriptor.artifacts()[1], &descriptor.output, Path::new("/p"), false);

        assert!(asset.map.is_none());
        assert!(asset.minify);
        assert_eq!(asset.filename, "beam.min.js");
    }
}
