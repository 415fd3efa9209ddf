//! Extraction of existing source maps from JavaScript files

use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::sourcemap::SourceMap;

static MAPPING_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(?://[#@]\s*sourceMappingURL=(?P<line>\S+)[ \t]*$|/\*[#@]\s*sourceMappingURL=(?P<block>[^\s*]+)\s*\*/)"#)
        .unwrap()
});

/// Code with its mapping comment removed, and the map it pointed at
#[derive(Debug, Default)]
pub struct Extracted {
    pub code: String,
    pub map: Option<SourceMap>,
    /// Why a referenced map could not be used
    pub warning: Option<String>,
}

/// Pull the map referenced by the last `sourceMappingURL` comment in `code`
pub fn extract(code: &str, path: &Path) -> Extracted {
    let Some(caps) = MAPPING_URL.captures_iter(code).last() else {
        return Extracted {
            code: code.to_string(),
            ..Default::default()
        };
    };
    let (Some(whole), Some(url)) = (caps.get(0), caps.name("line").or_else(|| caps.name("block")))
    else {
        return Extracted {
            code: code.to_string(),
            ..Default::default()
        };
    };

    // Blank out the comment but keep its newlines
    let mut stripped = String::with_capacity(code.len());
    stripped.push_str(&code[..whole.start()]);
    stripped.extend(std::iter::repeat('\n').take(whole.as_str().matches('\n').count()));
    stripped.push_str(&code[whole.end()..]);

    let base_dir = path.parent().unwrap_or(Path::new("."));
    let loaded = load_map(url.as_str(), base_dir);

    match loaded {
        Ok((mut map, map_dir)) => {
            map.map_sources(|source| absolutize(source, &map_dir));
            Extracted {
                code: stripped,
                map: Some(map),
                warning: None,
            }
        }
        Err(message) => Extracted {
            code: stripped,
            map: None,
            warning: Some(message),
        },
    }
}

/// Load a map from a data URL or a file next to the module
fn load_map(url: &str, base_dir: &Path) -> Result<(SourceMap, PathBuf), String> {
    if let Some(data) = url.strip_prefix("data:") {
        let (meta, payload) = data
            .split_once(',')
            .ok_or_else(|| "malformed data URL in sourceMappingURL".to_string())?;
        let json = if meta.ends_with(";base64") {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| format!("invalid base64 source map: {}", e))?;
            String::from_utf8(bytes).map_err(|e| format!("source map is not UTF-8: {}", e))?
        } else {
            payload.to_string()
        };
        let map = SourceMap::from_json(&json).map_err(|e| format!("invalid inline source map: {}", e))?;
        return Ok((map, base_dir.to_path_buf()));
    }

    let map_path = base_dir.join(url);
    let json = fs::read_to_string(&map_path)
        .map_err(|e| format!("cannot read source map {}: {}", map_path.display(), e))?;
    let map = SourceMap::from_json(&json)
        .map_err(|e| format!("invalid source map {}: {}", map_path.display(), e))?;
    let map_dir = map_path.parent().unwrap_or(base_dir).to_path_buf();
    Ok((map, map_dir))
}

/// Resolve a map source against the directory the map lives in
fn absolutize(source: &str, map_dir: &Path) -> String {
    if source.contains("://") || Path::new(source).is_absolute() {
        return source.to_string();
    }
    normalize(&map_dir.join(source)).display().to_string()
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"{"version":3,"sources":["../src/lib.ts"],"sourcesContent":["export const x = 1;"],"names":[],"mappings":"AAAA"}"#;

    #[test]
    fn test_no_comment_passes_through() {
        let out = extract("var a = 1;\n", Path::new("/p/a.js"));
        assert_eq!(out.code, "var a = 1;\n");
        assert!(out.map.is_none());
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_inline_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(MAP);
        let code = format!(
            "var x = 1;\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
            encoded
        );

        let out = extract(&code, Path::new("/project/dist/lib.js"));
        assert_eq!(out.code, "var x = 1;\n\n");
        let map = out.map.unwrap();
        assert_eq!(map.sources, vec!["/project/src/lib.ts".to_string()]);
        assert_eq!(map.sources_content[0].as_deref(), Some("export const x = 1;"));
    }

    #[test]
    fn test_adjacent_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("vendor.js.map"), MAP).unwrap();

        let out = extract(
            "var x = 1;\n/*# sourceMappingURL=vendor.js.map */",
            &lib.join("vendor.js"),
        );
        assert_eq!(out.code, "var x = 1;\n");
        let map = out.map.unwrap();
        assert_eq!(
            map.sources,
            vec![dir.path().join("src/lib.ts").display().to_string()]
        );
    }

    #[test]
    fn test_missing_map_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let out = extract(
            "var x = 1;\n//# sourceMappingURL=gone.js.map",
            &dir.path().join("x.js"),
        );
        assert_eq!(out.code, "var x = 1;\n");
        assert!(out.map.is_none());
        assert!(out.warning.unwrap().contains("gone.js.map"));
    }
}
