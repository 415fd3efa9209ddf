//! ES module to CommonJS interop
//!
//! Parses the module with `oxc_parser` and rewrites `import`/`export`
//! statements into `require` calls and export bindings the bundle runtime
//! installs as getters. Every reference to an imported binding is rewritten
//! to read through the required module, so imports stay live across cycles.
//! Edits are spliced into the original text and padded with the newlines
//! they removed, keeping line numbers stable.

use std::collections::{HashMap, HashSet};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Declaration, ExportAllDeclaration, ExportDefaultDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference,
    ImportDeclaration, ImportDeclarationSpecifier, ImportExpression, NewExpression, ObjectProperty,
    Program, Statement, StringLiteral, TaggedTemplateExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType, Span};

/// Runtime helper returning a module's default export
pub const DEFAULT_HELPER: &str = "__umdpack_default__";
/// Runtime helper installing getters for every export of another module
pub const REEXPORT_HELPER: &str = "__umdpack_reexport__";
/// Local holding an anonymous default export
pub const DEFAULT_EXPORT_LOCAL: &str = "__umdpack_default_export__";

/// An export installed on `exports` as a getter returning `expr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBinding {
    pub name: String,
    pub expr: String,
}

/// Result of the interop rewrite
#[derive(Debug, Clone, Default)]
pub struct Interop {
    pub code: String,
    /// Module requests in source order, without duplicates
    pub requests: Vec<String>,
    pub exports: Vec<ExportBinding>,
    /// The module used `import` or `export` syntax
    pub is_esm: bool,
}

#[derive(Debug)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

/// Rewrite ES module syntax in `source` to CommonJS
pub fn to_commonjs(source: &str) -> Result<Interop, String> {
    let allocator = Allocator::default();
    let program = parse(&allocator, source)?;
    let semantic = SemanticBuilder::new().build(&program).semantic;

    let mut module = ModuleRewrite {
        source,
        edits: Vec::new(),
        requests: Vec::new(),
        imports: HashMap::new(),
        import_locals: HashMap::new(),
        exports: Vec::new(),
        temp: 0,
        is_esm: false,
    };
    // imports first, so `export { local }` sees every imported binding
    for statement in &program.body {
        if let Statement::ImportDeclaration(decl) = statement {
            module.import(decl);
        }
    }
    for statement in &program.body {
        module.statement(statement);
    }

    let mut references = ReferenceRewrite {
        scoping: semantic.scoping(),
        imports: &module.imports,
        callees: HashSet::new(),
        edits: Vec::new(),
        requests: Vec::new(),
    };
    references.visit_program(&program);

    let ReferenceRewrite {
        edits: reference_edits,
        requests: calls,
        ..
    } = references;
    module.edits.extend(reference_edits);
    module.requests.extend(calls);

    let mut requests = module.requests;
    requests.sort_by_key(|(pos, _)| *pos);
    let mut interop = Interop {
        code: apply_edits(source, module.edits),
        exports: module.exports,
        is_esm: module.is_esm,
        ..Interop::default()
    };
    for (_, request) in requests {
        if !interop.requests.contains(&request) {
            interop.requests.push(request);
        }
    }
    Ok(interop)
}

/// Getter-installing prologue for a module's exports, on a single line
pub fn export_header(exports: &[ExportBinding]) -> String {
    let mut header = String::from("Object.defineProperty(exports, \"__esModule\", { value: true });");
    for binding in exports {
        header.push_str(&format!(
            " Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});",
            quote(&binding.name),
            binding.expr
        ));
    }
    header
}

/// Parse as a module, falling back to a script for sloppy-mode code
fn parse<'a>(allocator: &'a Allocator, source: &'a str) -> Result<Program<'a>, String> {
    let module = Parser::new(allocator, source, SourceType::mjs()).parse();
    if module.errors.is_empty() && !module.panicked {
        return Ok(module.program);
    }
    let script = Parser::new(allocator, source, SourceType::cjs()).parse();
    if script.errors.is_empty() && !script.panicked {
        return Ok(script.program);
    }
    Err(module
        .errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unparsable module".to_string()))
}

/// Statement-level rewrite of module declarations
struct ModuleRewrite<'s> {
    source: &'s str,
    edits: Vec<Edit>,
    requests: Vec<(u32, String)>,
    /// Imported symbol to the expression that reads it
    imports: HashMap<SymbolId, String>,
    /// Imported local name to the same expression
    import_locals: HashMap<String, String>,
    exports: Vec<ExportBinding>,
    temp: usize,
    is_esm: bool,
}

impl<'s> ModuleRewrite<'s> {
    fn statement(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::ExportNamedDeclaration(decl) => self.export_named(decl),
            Statement::ExportDefaultDeclaration(decl) => self.export_default(decl),
            Statement::ExportAllDeclaration(decl) => self.export_all(decl),
            _ => {}
        }
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        self.is_esm = true;
        let spec = self.request(&decl.source);

        let specifiers = match &decl.specifiers {
            Some(specifiers) if !specifiers.is_empty() => specifiers,
            _ => {
                self.replace(decl.span, format!("require({});", spec));
                return;
            }
        };

        let local = self.temp_name();
        for specifier in specifiers {
            let (binding, expr) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    (&s.local, member(&local, &s.imported.name()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (&s.local, member(&local, "default"))
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => (&s.local, local.clone()),
            };
            if let Some(symbol) = binding.symbol_id.get() {
                self.imports.insert(symbol, expr.clone());
            }
            self.import_locals.insert(binding.name.to_string(), expr);
        }
        self.replace(decl.span, format!("var {} = require({});", local, spec));
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) {
        self.is_esm = true;

        if let Some(declaration) = &decl.declaration {
            for name in declared_names(declaration) {
                self.export(&name, &name);
            }
            self.replace(
                Span::new(decl.span.start, declaration.span().start),
                String::new(),
            );
            return;
        }

        match &decl.source {
            Some(source) => {
                let spec = self.request(source);
                let local = self.temp_name();
                for specifier in &decl.specifiers {
                    let expr = member(&local, &specifier.local.name());
                    self.export(&specifier.exported.name(), &expr);
                }
                self.replace(decl.span, format!("var {} = require({});", local, spec));
            }
            None => {
                for specifier in &decl.specifiers {
                    let local = specifier.local.name();
                    let expr = self
                        .import_locals
                        .get(local.as_str())
                        .cloned()
                        .unwrap_or_else(|| local.to_string());
                    self.export(&specifier.exported.name(), &expr);
                }
                self.replace(decl.span, String::new());
            }
        }
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) {
        self.is_esm = true;
        let named = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(f) => f.id.as_ref().map(|id| id.name.to_string()),
            ExportDefaultDeclarationKind::ClassDeclaration(c) => c.id.as_ref().map(|id| id.name.to_string()),
            _ => None,
        };
        let body = Span::new(decl.span.start, decl.declaration.span().start);
        match named {
            Some(name) => {
                self.export("default", &name);
                self.replace(body, String::new());
            }
            None => {
                self.export("default", DEFAULT_EXPORT_LOCAL);
                self.replace(body, format!("var {} = ", DEFAULT_EXPORT_LOCAL));
            }
        }
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) {
        self.is_esm = true;
        let spec = self.request(&decl.source);
        match &decl.exported {
            Some(exported) => {
                let local = self.temp_name();
                self.export(&exported.name(), &local);
                self.replace(decl.span, format!("var {} = require({});", local, spec));
            }
            None => self.replace(
                decl.span,
                format!("{}(exports, require({}));", REEXPORT_HELPER, spec),
            ),
        }
    }

    /// Record a request; returns the literal as written
    fn request(&mut self, literal: &StringLiteral<'_>) -> String {
        self.requests.push((literal.span.start, literal.value.to_string()));
        literal.span.source_text(self.source).to_string()
    }

    fn export(&mut self, name: &str, expr: &str) {
        if self.exports.iter().any(|e| e.name == name) {
            return;
        }
        self.exports.push(ExportBinding {
            name: name.to_string(),
            expr: expr.to_string(),
        });
    }

    fn replace(&mut self, span: Span, text: String) {
        self.edits.push(Edit {
            start: span.start,
            end: span.end,
            text,
        });
    }

    fn temp_name(&mut self) -> String {
        let name = format!("__umdpack_import_{}__", self.temp);
        self.temp += 1;
        name
    }
}

/// Rewrites reads of imported bindings and collects `require`/`import()` requests
struct ReferenceRewrite<'m> {
    scoping: &'m Scoping,
    imports: &'m HashMap<SymbolId, String>,
    /// Start offsets of identifiers used as callees
    callees: HashSet<u32>,
    edits: Vec<Edit>,
    requests: Vec<(u32, String)>,
}

impl<'m> ReferenceRewrite<'m> {
    fn binding(&self, ident: &IdentifierReference<'_>) -> Option<&'m String> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.imports.get(&symbol)
    }

    fn is_unbound(&self, ident: &IdentifierReference<'_>) -> bool {
        ident
            .reference_id
            .get()
            .map_or(true, |reference| self.scoping.get_reference(reference).symbol_id().is_none())
    }

    fn mark_callee(&mut self, callee: &Expression<'_>) {
        if let Expression::Identifier(ident) = callee {
            self.callees.insert(ident.span.start);
        }
    }
}

impl<'a, 'm> Visit<'a> for ReferenceRewrite<'m> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        let Some(expr) = self.binding(ident) else {
            return;
        };
        // a member read as callee would bind `this` to the module
        let text = if self.callees.contains(&ident.span.start) {
            format!("(0, {})", expr)
        } else {
            expr.clone()
        };
        self.edits.push(Edit {
            start: ident.span.start,
            end: ident.span.end,
            text,
        });
    }

    fn visit_object_property(&mut self, property: &ObjectProperty<'a>) {
        if property.shorthand {
            if let Expression::Identifier(ident) = &property.value {
                if let Some(expr) = self.binding(ident) {
                    self.edits.push(Edit {
                        start: property.span.start,
                        end: property.span.end,
                        text: format!("{}: {}", ident.name, expr),
                    });
                    return;
                }
            }
        }
        walk::walk_object_property(self, property);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        self.mark_callee(&call.callee);
        if let Expression::Identifier(callee) = &call.callee {
            if callee.name == "require" && call.arguments.len() == 1 && self.is_unbound(callee) {
                if let Argument::StringLiteral(literal) = &call.arguments[0] {
                    self.requests.push((literal.span.start, literal.value.to_string()));
                }
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_new_expression(&mut self, new: &NewExpression<'a>) {
        self.mark_callee(&new.callee);
        walk::walk_new_expression(self, new);
    }

    fn visit_tagged_template_expression(&mut self, tagged: &TaggedTemplateExpression<'a>) {
        self.mark_callee(&tagged.tag);
        walk::walk_tagged_template_expression(self, tagged);
    }

    fn visit_import_expression(&mut self, import: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &import.source {
            self.requests.push((literal.span.start, literal.value.to_string()));
        }
        let source = import.source.span();
        self.edits.push(Edit {
            start: import.span.start,
            end: source.start,
            text: "Promise.resolve().then(function () { return require(".to_string(),
        });
        self.edits.push(Edit {
            start: source.end,
            end: import.span.end,
            text: "); })".to_string(),
        });
        walk::walk_import_expression(self, import);
    }
}

/// Splice `edits` into `source`; an edit overlapping an earlier one is dropped
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    // earliest first; at the same position the widest edit wins
    edits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut code = String::with_capacity(source.len());
    let mut last = 0usize;
    for edit in edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start < last {
            continue;
        }
        code.push_str(&source[last..start]);
        let missing = source[start..end]
            .matches('\n')
            .count()
            .saturating_sub(edit.text.matches('\n').count());
        code.push_str(&edit.text);
        code.extend(std::iter::repeat('\n').take(missing));
        last = end;
    }
    code.push_str(&source[last..]);
    code
}

/// Names bound by an exported declaration
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => f.id.iter().map(|id| id.name.to_string()).collect(),
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Expression reading export `imported` of the module held in `local`
fn member(local: &str, imported: &str) -> String {
    if imported == "default" {
        format!("{}({})", DEFAULT_HELPER, local)
    } else if is_identifier_name(imported) {
        format!("{}.{}", local, imported)
    } else {
        format!("{}[{}]", local, quote(imported))
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c == '$' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_import_forms() {
        let out = to_commonjs(
            "import a from \"./a\";\nimport * as ns from \"./b\";\nimport d, { x, y as z } from \"./c\";\nimport \"./d\";\nconsole.log(a, ns.k, d, x + z);",
        )
        .unwrap();

        assert_eq!(
            out.code,
            "var __umdpack_import_0__ = require(\"./a\");\n\
             var __umdpack_import_1__ = require(\"./b\");\n\
             var __umdpack_import_2__ = require(\"./c\");\n\
             require(\"./d\");\n\
             console.log(__umdpack_default__(__umdpack_import_0__), __umdpack_import_1__.k, __umdpack_default__(__umdpack_import_2__), __umdpack_import_2__.x + __umdpack_import_2__.y);"
        );
        assert_eq!(out.requests, vec!["./a", "./b", "./c", "./d"]);
        assert!(out.is_esm);
        assert!(out.exports.is_empty());
    }

    #[test]
    fn test_imported_bindings_are_read_live() {
        let out = to_commonjs(
            "import { count } from './counter';\nexport function next() {\n  return count + 1;\n}\n",
        )
        .unwrap();
        assert!(out.code.contains("return __umdpack_import_0__.count + 1;"));
        assert!(!out.code.contains("var count"));
    }

    #[test]
    fn test_shadowed_import_is_untouched() {
        let out = to_commonjs(
            "import { x } from './x';\nfunction f(x) {\n  return x;\n}\nf(x);\n",
        )
        .unwrap();
        assert!(out.code.contains("function f(x) {\n  return x;\n}"));
        assert!(out.code.contains("f(__umdpack_import_0__.x);"));
    }

    #[test]
    fn test_imported_callee_and_shorthand() {
        let out = to_commonjs("import { run } from './r';\nrun();\nconst o = { run };\n").unwrap();
        assert!(out.code.contains("(0, __umdpack_import_0__.run)();"));
        assert!(out.code.contains("const o = { run: __umdpack_import_0__.run };"));
    }

    #[test]
    fn test_export_forms() {
        let out = to_commonjs(
            "export const a = 1, b = 2;\nexport function f() {}\nexport class K {}\nconst hidden = 3;\nexport { hidden as visible };\nexport default f;",
        )
        .unwrap();

        assert_eq!(
            out.code,
            "const a = 1, b = 2;\nfunction f() {}\nclass K {}\nconst hidden = 3;\n\nvar __umdpack_default_export__ = f;"
        );
        let names: Vec<(&str, &str)> = out
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.expr.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a", "a"),
                ("b", "b"),
                ("f", "f"),
                ("K", "K"),
                ("visible", "hidden"),
                ("default", "__umdpack_default_export__"),
            ]
        );
    }

    #[test]
    fn test_named_default_export_keeps_declaration() {
        let out = to_commonjs("export default class Beam {}\n").unwrap();
        assert_eq!(out.code, "class Beam {}\n");
        assert_eq!(
            out.exports,
            vec![ExportBinding {
                name: "default".to_string(),
                expr: "Beam".to_string(),
            }]
        );
    }

    #[test]
    fn test_reexports() {
        let out = to_commonjs(
            "export * from \"./x\";\nexport { a as b, default as c } from \"./y\";\nexport * as ns from './z';",
        )
        .unwrap();
        assert_eq!(
            out.code,
            "__umdpack_reexport__(exports, require(\"./x\"));\nvar __umdpack_import_0__ = require(\"./y\");\nvar __umdpack_import_1__ = require('./z');"
        );
        assert_eq!(out.exports[0].expr, "__umdpack_import_0__.a");
        assert_eq!(out.exports[1].expr, "__umdpack_default__(__umdpack_import_0__)");
        assert_eq!(out.exports[2].name, "ns");
        assert_eq!(out.exports[2].expr, "__umdpack_import_1__");
        assert_eq!(out.requests, vec!["./x", "./y", "./z"]);
    }

    #[test]
    fn test_reexported_import_stays_live() {
        let out = to_commonjs("export { z as alias };\nimport { y as z } from './a';\n").unwrap();
        assert_eq!(out.exports[0].name, "alias");
        assert_eq!(out.exports[0].expr, "__umdpack_import_0__.y");
    }

    #[test]
    fn test_imported_default_as_constructor() {
        let out = to_commonjs("import Widget from './w';\nnew Widget();\n").unwrap();
        assert!(out.code.contains("new (0, __umdpack_default__(__umdpack_import_0__))();"));
    }

    #[test]
    fn test_multiline_import_keeps_line_count() {
        let source = "import {\n  a,\n  b\n} from './m';\nconsole.log(a, b);\n";
        let out = to_commonjs(source).unwrap();
        assert_eq!(out.code.matches('\n').count(), source.matches('\n').count());
        assert!(out.code.ends_with("\n\n\n\nconsole.log(__umdpack_import_0__.a, __umdpack_import_0__.b);\n"));
    }

    #[test]
    fn test_dynamic_import_and_require() {
        let out = to_commonjs("const m = import('./lazy');\nconst r = require(\"./eager\");").unwrap();
        assert_eq!(
            out.code,
            "const m = Promise.resolve().then(function () { return require('./lazy'); });\nconst r = require(\"./eager\");"
        );
        assert_eq!(out.requests, vec!["./lazy", "./eager"]);
        assert!(!out.is_esm);
    }

    #[test]
    fn test_local_require_is_not_a_request() {
        let out = to_commonjs("function require(x) { return x; }\nrequire('./not-a-module');\n").unwrap();
        assert!(out.requests.is_empty());
    }

    #[test]
    fn test_literals_are_not_rewritten() {
        let source = "const s = \"import x from 'y'\";\n// export default 1\nconst re = /import\\(/;";
        let out = to_commonjs(source).unwrap();
        assert_eq!(out.code, source);
        assert!(out.requests.is_empty());
        assert!(!out.is_esm);
    }

    #[test]
    fn test_script_only_syntax_is_accepted() {
        let source = "var await = 1;\nmodule.exports = await;\n";
        let out = to_commonjs(source).unwrap();
        assert_eq!(out.code, source);
    }

    #[test]
    fn test_destructured_export_names() {
        let out = to_commonjs("export const { a, b: c, ...rest } = obj;").unwrap();
        let names: Vec<&str> = out.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "rest"]);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(to_commonjs("import { from './x';").is_err());
    }

    #[test]
    fn test_export_header() {
        let header = export_header(&[ExportBinding {
            name: "version".to_string(),
            expr: "VERSION".to_string(),
        }]);
        assert_eq!(
            header,
            "Object.defineProperty(exports, \"__esModule\", { value: true }); Object.defineProperty(exports, \"version\", { enumerable: true, get: function () { return VERSION; } });"
        );
        assert!(!header.contains('\n'));
    }
}
