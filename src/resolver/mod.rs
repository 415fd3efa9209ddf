//! Module resolution
//!
//! Resolves entry and import requests to files. A request is tried as the
//! literal path, then with each configured extension appended in order, then
//! as a directory containing `index` + extension. Bare requests are looked up
//! in `node_modules` directories walking upwards from the importer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{BuildDescriptor, EntryPoint};
use crate::error::{BuildError, Result};

/// Module resolver
pub struct Resolver {
    descriptor: Arc<BuildDescriptor>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(descriptor: Arc<BuildDescriptor>) -> Self {
        Self { descriptor }
    }

    /// Resolve an entry point's request against the project root
    pub fn resolve_entry(&self, entry: &EntryPoint) -> Result<PathBuf> {
        let mut tried = Vec::new();
        let target = self.descriptor.root.join(&entry.request);
        match self.resolve_path(&target, &mut tried) {
            Some(path) => Ok(path),
            None => Err(BuildError::Resolution {
                request: entry.request.clone(),
                importer: self.descriptor.root.clone(),
                tried,
            }),
        }
    }

    /// Resolve an import request made by `from`
    pub fn resolve(&self, request: &str, from: &Path) -> Result<PathBuf> {
        debug!("Resolving '{}' from '{}'", request, from.display());

        let mut tried = Vec::new();
        let base_dir = from.parent().unwrap_or(Path::new("."));

        let resolved = if is_path_request(request) {
            self.resolve_path(&base_dir.join(request), &mut tried)
        } else {
            self.resolve_bare(request, base_dir, &mut tried)?
        };

        match resolved {
            Some(path) => {
                debug!("Resolved to: {}", path.display());
                Ok(path)
            }
            None => Err(BuildError::Resolution {
                request: request.to_string(),
                importer: from.to_path_buf(),
                tried,
            }),
        }
    }

    /// Every existing file a path request could resolve to, in priority order
    pub fn candidates(&self, target: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        if target.is_file() {
            found.push(target.to_path_buf());
        }
        for ext in &self.descriptor.extensions {
            let with_ext = append_extension(target, ext);
            if with_ext.is_file() {
                found.push(with_ext);
            }
        }
        found
    }

    /// Resolve a path request: literal, then extensions, then directory index
    fn resolve_path(&self, target: &Path, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        tried.push(target.to_path_buf());
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        for ext in &self.descriptor.extensions {
            let with_ext = append_extension(target, ext);
            tried.push(with_ext.clone());
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if target.is_dir() {
            for ext in &self.descriptor.extensions {
                let index = target.join(format!("index{}", ext));
                tried.push(index.clone());
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare import (from node_modules)
    fn resolve_bare(
        &self,
        request: &str,
        from_dir: &Path,
        tried: &mut Vec<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        let mut current = from_dir.to_path_buf();

        // Walk up directory tree looking for node_modules
        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, request, tried)? {
                    return Ok(Some(resolved));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(
        &self,
        node_modules: &Path,
        request: &str,
        tried: &mut Vec<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        let (package_name, subpath) = split_package_request(request);
        let package_dir = node_modules.join(&package_name);

        if !package_dir.is_dir() {
            tried.push(package_dir);
            return Ok(None);
        }

        if let Some(sub) = subpath {
            return Ok(self.resolve_path(&package_dir.join(sub), tried));
        }

        let package_json = package_dir.join("package.json");
        if package_json.is_file() {
            let content = fs::read_to_string(&package_json).map_err(|source| BuildError::Read {
                path: package_json.clone(),
                source,
            })?;
            let pkg: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| BuildError::Loader {
                    path: package_json.clone(),
                    loader: "json",
                    rule: 0,
                    message: e.to_string(),
                })?;

            for field in ["module", "main"] {
                if let Some(main) = pkg.get(field).and_then(|v| v.as_str()) {
                    if let Some(found) = self.resolve_path(&package_dir.join(main), tried) {
                        return Ok(Some(found));
                    }
                }
            }
        }

        Ok(self.resolve_path(&package_dir.join("index"), tried))
    }
}

/// Relative or absolute requests resolve against the filesystem directly
fn is_path_request(request: &str) -> bool {
    request.starts_with("./")
        || request.starts_with("../")
        || request == "."
        || request == ".."
        || Path::new(request).is_absolute()
}

/// `foo.ts` + `.js` is `foo.ts.js`, not `foo.js`
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(ext);
    PathBuf::from(raw)
}

/// Split `@scope/name/sub` or `name/sub` into package name and subpath
fn split_package_request(request: &str) -> (String, Option<String>) {
    if request.starts_with('@') {
        let parts: Vec<&str> = request.splitn(3, '/').collect();
        if parts.len() < 2 {
            return (request.to_string(), None);
        }
        let name = format!("{}/{}", parts[0], parts[1]);
        (name, parts.get(2).map(|s| s.to_string()))
    } else {
        let parts: Vec<&str> = request.splitn(2, '/').collect();
        (parts[0].to_string(), parts.get(1).map(|s| s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn resolver_for(root: &Path, extensions: &[&str]) -> Resolver {
        let mut config = Config::library_template("Lib", "lib");
        config.root = root.to_path_buf();
        config.resolve.extensions = extensions.iter().map(|e| e.to_string()).collect();
        Resolver::new(Arc::new(BuildDescriptor::from_config(&config).unwrap()))
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_extensions_tried_in_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src/util.ts"));
        touch(&dir.path().join("src/util.js"));
        let importer = dir.path().join("src/index.ts");

        let ts_first = resolver_for(dir.path(), &[".ts", ".js"]);
        assert_eq!(
            ts_first.resolve("./util", &importer).unwrap(),
            dir.path().join("src/util.ts")
        );

        let js_first = resolver_for(dir.path(), &[".js", ".ts"]);
        assert_eq!(
            js_first.resolve("./util", &importer).unwrap(),
            dir.path().join("src/util.js")
        );
    }

    #[test]
    fn test_literal_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("data.json"));
        touch(&dir.path().join("data.json.ts"));

        let resolver = resolver_for(dir.path(), &[".ts", ".js"]);
        let resolved = resolver
            .resolve("./data.json", &dir.path().join("index.ts"))
            .unwrap();
        assert_eq!(resolved, dir.path().join("data.json"));
    }

    #[test]
    fn test_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("lib/index.ts"));

        let resolver = resolver_for(dir.path(), &[".ts", ".js"]);
        let resolved = resolver.resolve("./lib", &dir.path().join("main.ts")).unwrap();
        assert_eq!(resolved, dir.path().join("lib/index.ts"));
    }

    #[test]
    fn test_unresolvable_reports_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_for(dir.path(), &[".ts", ".js"]);

        let err = resolver
            .resolve("./missing", &dir.path().join("index.ts"))
            .unwrap_err();
        match err {
            BuildError::Resolution { request, tried, .. } => {
                assert_eq!(request, "./missing");
                assert_eq!(
                    tried,
                    vec![
                        dir.path().join("missing"),
                        dir.path().join("missing.ts"),
                        dir.path().join("missing.js"),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_entry_resolution() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("source/index.ts"));

        let resolver = resolver_for(dir.path(), &[".ts", ".js"]);
        let entry = EntryPoint {
            name: "lib".to_string(),
            request: "./source/index".to_string(),
            minify: None,
        };
        assert_eq!(
            resolver.resolve_entry(&entry).unwrap(),
            dir.path().join("./source/index.ts")
        );
    }

    #[test]
    fn test_bare_request_uses_package_json() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("node_modules/tiny");
        touch(&pkg.join("lib/tiny.js"));
        fs::write(pkg.join("package.json"), r#"{"main": "lib/tiny.js"}"#).unwrap();
        touch(&dir.path().join("node_modules/@scope/pkg/util.js"));

        let resolver = resolver_for(dir.path(), &[".ts", ".js"]);
        let importer = dir.path().join("src/index.ts");

        assert_eq!(
            resolver.resolve("tiny", &importer).unwrap(),
            pkg.join("lib/tiny.js")
        );
        assert_eq!(
            resolver.resolve("@scope/pkg/util", &importer).unwrap(),
            dir.path().join("node_modules/@scope/pkg/util.js")
        );
    }

    #[test]
    fn test_split_package_request() {
        assert_eq!(split_package_request("lodash"), ("lodash".to_string(), None));
        assert_eq!(
            split_package_request("lodash/fp"),
            ("lodash".to_string(), Some("fp".to_string()))
        );
        assert_eq!(
            split_package_request("@scope/pkg/a/b"),
            ("@scope/pkg".to_string(), Some("a/b".to_string()))
        );
    }
}
