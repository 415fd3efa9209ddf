//! Library packaging
//!
//! Every artifact is a factory function holding the module runtime and the
//! module table. The prologue and epilogue register that factory under the
//! configured library convention.

use crate::config::{LibraryTarget, OutputDescriptor};
use crate::transform::esm::{DEFAULT_HELPER, REEXPORT_HELPER};

/// Module table and `require` implementation shared by every artifact
pub fn runtime() -> String {
    format!(
        r#"var __umdpack_modules__ = [];
var __umdpack_cache__ = {{}};
function __umdpack_require__(id) {{
  var cached = __umdpack_cache__[id];
  if (cached) return cached.exports;
  var module = __umdpack_cache__[id] = {{ id: id, exports: {{}} }};
  var definition = __umdpack_modules__[id];
  definition[0].call(module.exports, module, module.exports, function (request) {{
    var target = definition[1][request];
    if (target === undefined) throw new Error("Cannot find module '" + request + "'");
    return __umdpack_require__(target);
  }});
  return module.exports;
}}
function {default}(m) {{ return m && m.__esModule ? m["default"] : m; }}
function {reexport}(target, source) {{
  Object.keys(source).forEach(function (key) {{
    if (key === "default" || Object.prototype.hasOwnProperty.call(target, key)) return;
    Object.defineProperty(target, key, {{ enumerable: true, get: function () {{ return source[key]; }} }});
  }});
}}
"#,
        default = DEFAULT_HELPER,
        reexport = REEXPORT_HELPER
    )
}

/// Code placed before the factory body
pub fn prologue(output: &OutputDescriptor) -> String {
    let library = output.library.as_deref().map(quote);
    match output.library_target {
        LibraryTarget::Var => format!(
            "var {} = (function () {{\n",
            output.library.as_deref().unwrap_or("__umdpack_library__")
        ),
        LibraryTarget::CommonJs => format!(
            "exports[{}] = (function () {{\n",
            library.unwrap_or_default()
        ),
        LibraryTarget::CommonJs2 => "module.exports = (function () {\n".to_string(),
        LibraryTarget::Amd => format!("define({}[], function () {{\n", define_name(output)),
        LibraryTarget::Umd => {
            let mut out = String::from("(function (root, factory) {\n");
            out.push_str("  if (typeof exports === \"object\" && typeof module === \"object\")\n");
            out.push_str("    module.exports = factory();\n");
            out.push_str("  else if (typeof define === \"function\" && define.amd)\n");
            out.push_str(&format!("    define({}[], factory);\n", define_name(output)));
            match &library {
                Some(name) => {
                    out.push_str("  else if (typeof exports === \"object\")\n");
                    out.push_str(&format!("    exports[{}] = factory();\n", name));
                    out.push_str("  else\n");
                    out.push_str(&format!("    root[{}] = factory();\n", name));
                }
                None => {
                    out.push_str("  else {\n");
                    out.push_str("    var a = factory();\n");
                    out.push_str(
                        "    for (var i in a) (typeof exports === \"object\" ? exports : root)[i] = a[i];\n",
                    );
                    out.push_str("  }\n");
                }
            }
            out.push_str("})(typeof self !== \"undefined\" ? self : this, function () {\n");
            out
        }
    }
}

/// Code placed after the factory body, which ends by returning the entry's exports
pub fn epilogue(output: &OutputDescriptor) -> String {
    match output.library_target {
        LibraryTarget::Var | LibraryTarget::CommonJs | LibraryTarget::CommonJs2 => {
            "})();\n".to_string()
        }
        LibraryTarget::Amd | LibraryTarget::Umd => "});\n".to_string(),
    }
}

/// `"Name", ` for a named define, empty for an anonymous one
fn define_name(output: &OutputDescriptor) -> String {
    match (&output.library, output.umd_named_define) {
        (Some(name), true) => format!("{}, ", quote(name)),
        _ => String::new(),
    }
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}
