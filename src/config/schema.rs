//! Configuration schema definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pattern::PatternConfig;

/// An entry point as written in `[entry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryConfig {
    /// `beam = "./source/index.ts"`
    Path(String),

    /// `beam = { import = "./source/index.ts", minify = true }`
    Detailed {
        import: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minify: Option<bool>,
    },
}

impl EntryConfig {
    /// The source request for this entry
    pub fn request(&self) -> &str {
        match self {
            EntryConfig::Path(path) => path,
            EntryConfig::Detailed { import, .. } => import,
        }
    }

    /// Explicit per-artifact optimization flag, if any
    pub fn minify(&self) -> Option<bool> {
        match self {
            EntryConfig::Path(_) => None,
            EntryConfig::Detailed { minify, .. } => *minify,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Output filename pattern, expanded per artifact
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Module packaging format
    #[serde(default)]
    pub library_target: LibraryTarget,

    /// Name the bundle is registered under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Use a named module id for AMD registration
    #[serde(default)]
    pub umd_named_define: bool,

    /// Generate asset manifest
    #[serde(default)]
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            filename: default_filename(),
            library_target: LibraryTarget::default(),
            library: None,
            umd_named_define: false,
            manifest: false,
        }
    }
}

fn default_output_path() -> String {
    "dist".to_string()
}

fn default_filename() -> String {
    "[name].js".to_string()
}

/// Library packaging format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryTarget {
    /// `var Library = ...`
    Var,
    /// `exports["Library"] = ...`
    CommonJs,
    /// `module.exports = ...`
    CommonJs2,
    /// `define([], factory)`
    Amd,
    /// All of the above, picked at load time
    #[default]
    Umd,
}

impl LibraryTarget {
    /// Whether this target needs `output.library` to be set
    pub fn requires_name(&self) -> bool {
        matches!(self, LibraryTarget::Var | LibraryTarget::CommonJs)
    }
}

impl fmt::Display for LibraryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LibraryTarget::Var => "var",
            LibraryTarget::CommonJs => "commonjs",
            LibraryTarget::CommonJs2 => "commonjs2",
            LibraryTarget::Amd => "amd",
            LibraryTarget::Umd => "umd",
        };
        f.write_str(name)
    }
}

/// Module resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Extensions tried, in order, when a request omits one
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".json".to_string()]
}

/// Source map emission strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Devtool {
    #[default]
    None,
    /// Separate `.map` file referenced from the bundle
    SourceMap,
    /// Separate `.map` file, no reference comment
    HiddenSourceMap,
    /// Base64 data URL appended to the bundle
    InlineSourceMap,
}

impl Devtool {
    pub fn emits_map(&self) -> bool {
        !matches!(self, Devtool::None)
    }

    pub fn writes_map_file(&self) -> bool {
        matches!(self, Devtool::SourceMap | Devtool::HiddenSourceMap)
    }
}

impl std::str::FromStr for Devtool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "false" => Ok(Devtool::None),
            "source-map" => Ok(Devtool::SourceMap),
            "hidden-source-map" => Ok(Devtool::HiddenSourceMap),
            "inline-source-map" => Ok(Devtool::InlineSourceMap),
            other => Err(format!(
                "unknown devtool '{}' (expected none, source-map, hidden-source-map or inline-source-map)",
                other
            )),
        }
    }
}

/// `[module]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Per-file transform rules, in declaration order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A transform rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Files this rule applies to
    pub test: PatternConfig,

    /// Files excluded even if `test` matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PatternConfig>,

    /// Processing step
    pub loader: LoaderKind,

    /// Phase the rule runs in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce: Option<Enforce>,
}

/// Built-in processing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaderKind {
    /// Compile TypeScript to JavaScript (type erasure)
    #[serde(
        rename = "typescript",
        alias = "ts-loader",
        alias = "awesome-typescript-loader"
    )]
    TypeScript,

    /// Extract existing source maps
    #[serde(rename = "source-map", alias = "source-map-loader")]
    SourceMap,

    /// Parse JSON into a module
    #[serde(rename = "json", alias = "json-loader")]
    Json,

    /// Export file content as a string
    #[serde(rename = "raw", alias = "raw-loader")]
    Raw,
}

impl LoaderKind {
    pub fn name(&self) -> &'static str {
        match self {
            LoaderKind::TypeScript => "typescript",
            LoaderKind::SourceMap => "source-map",
            LoaderKind::Json => "json",
            LoaderKind::Raw => "raw",
        }
    }
}

/// Rule phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforce {
    Pre,
    Post,
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name/identifier
    pub name: String,

    /// Plugin-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<toml::Table>,
}

impl PluginConfig {
    /// Read a string option
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|o| o.get(key))
            .and_then(|v| v.as_str())
    }

    /// Read a boolean option
    pub fn bool_option(&self, key: &str) -> Option<bool> {
        self.options
            .as_ref()
            .and_then(|o| o.get(key))
            .and_then(|v| v.as_bool())
    }

    /// Read a pattern option (glob string or `{ regex = ... }` table)
    pub fn pattern_option(&self, key: &str) -> Result<Option<PatternConfig>, String> {
        let Some(value) = self.options.as_ref().and_then(|o| o.get(key)) else {
            return Ok(None);
        };
        value
            .clone()
            .try_into::<PatternConfig>()
            .map(Some)
            .map_err(|e| format!("plugin `{}` option `{}`: {}", self.name, key, e))
    }
}
