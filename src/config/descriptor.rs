//! The normalized, immutable build target description

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::pattern::Pattern;
use super::schema::{Devtool, Enforce, EntryConfig, LibraryTarget, LoaderKind, PluginConfig};
use super::Config;
use crate::error::{BuildError, Result};

/// Plugin names that configure the optimization rule
pub const MINIFY_PLUGIN_NAMES: &[&str] = &["minify", "uglify", "uglifyjs", "terser"];

/// Hash length used when `[contenthash]` has no explicit length
const DEFAULT_HASH_LENGTH: usize = 20;

/// A named entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub request: String,
    /// Explicit optimization flag; `None` defers to the optimization rule
    pub minify: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilenamePart {
    Literal(String),
    Name,
    ContentHash(usize),
}

/// Parsed `output.filename`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    parts: Vec<FilenamePart>,
}

impl FilenameTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find('[') {
            let Some(len) = rest[start..].find(']') else {
                break;
            };
            let token = &rest[start + 1..start + len];
            let part = match token {
                "name" => Some(FilenamePart::Name),
                "contenthash" => Some(FilenamePart::ContentHash(DEFAULT_HASH_LENGTH)),
                _ => match token.strip_prefix("contenthash:") {
                    Some(n) => {
                        let n: usize = n.parse().map_err(|_| {
                            BuildError::config(format!(
                                "invalid hash length in output.filename `{}`",
                                source
                            ))
                        })?;
                        if n == 0 || n > 64 {
                            return Err(BuildError::config(format!(
                                "hash length in output.filename `{}` must be between 1 and 64",
                                source
                            )));
                        }
                        Some(FilenamePart::ContentHash(n))
                    }
                    None => None,
                },
            };

            match part {
                Some(part) => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        parts.push(FilenamePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(part);
                }
                // Unknown placeholders are kept verbatim
                None => literal.push_str(&rest[..start + len + 1]),
            }
            rest = &rest[start + len + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(FilenamePart::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn has_name(&self) -> bool {
        self.parts.contains(&FilenamePart::Name)
    }

    pub fn has_hash(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, FilenamePart::ContentHash(_)))
    }

    /// Expand for an artifact; without a hash, hash placeholders become zeros
    pub fn expand(&self, name: &str, hash: Option<&str>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                FilenamePart::Literal(text) => out.push_str(text),
                FilenamePart::Name => out.push_str(name),
                FilenamePart::ContentHash(len) => match hash {
                    Some(hash) => out.push_str(&hash[..(*len).min(hash.len())]),
                    None => out.push_str(&"0".repeat(*len)),
                },
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Normalized output settings
#[derive(Debug, Clone)]
pub struct OutputDescriptor {
    pub dir: PathBuf,
    pub filename: FilenameTemplate,
    pub library_target: LibraryTarget,
    pub library: Option<String>,
    pub umd_named_define: bool,
    pub manifest: bool,
}

/// A compiled transform rule
#[derive(Debug, Clone)]
pub struct TransformRule {
    /// Position in `module.rules`
    pub index: usize,
    pub test: Pattern,
    pub exclude: Option<Pattern>,
    pub loader: LoaderKind,
    pub enforce: Option<Enforce>,
}

impl TransformRule {
    pub fn matches(&self, path: &Path) -> bool {
        self.test.matches_path(path)
            && !self
                .exclude
                .as_ref()
                .map(|e| e.matches_path(path))
                .unwrap_or(false)
    }
}

/// Conditional minification
#[derive(Debug, Clone)]
pub struct OptimizationRule {
    pub include: Option<Pattern>,
    pub exclude: Option<Pattern>,
    /// Keep source maps for optimized artifacts
    pub source_map: bool,
}

impl OptimizationRule {
    pub fn matches(&self, filename: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map(|p| p.matches(filename))
            .unwrap_or(false);
        let excluded = self
            .exclude
            .as_ref()
            .map(|p| p.matches(filename))
            .unwrap_or(false);
        included && !excluded
    }
}

/// An artifact derived from an entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    pub name: String,
    /// Filename with hash placeholders zeroed
    pub filename: String,
    pub minify: bool,
}

/// The build target description: everything a build reads, fixed at construction
#[derive(Debug, Clone)]
pub struct BuildDescriptor {
    pub root: PathBuf,
    pub entries: Vec<EntryPoint>,
    pub output: OutputDescriptor,
    pub extensions: Vec<String>,
    pub devtool: Devtool,
    pub rules: Vec<TransformRule>,
    pub optimization: Option<OptimizationRule>,
    /// Plugins in declaration order, including the minify plugin
    pub plugins: Vec<PluginConfig>,
}

impl BuildDescriptor {
    /// Validate and normalize a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let entries = config
            .entry
            .iter()
            .map(|(name, entry)| entry_point(name, entry))
            .collect::<Vec<_>>();

        let filename = FilenameTemplate::parse(&config.output.filename)?;

        let library = config
            .output
            .library
            .as_ref()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        if library.is_none() && config.output.library_target.requires_name() {
            return Err(BuildError::config(format!(
                "output.library is required when library_target is `{}`",
                config.output.library_target
            )));
        }

        let rules = config
            .module
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Ok(TransformRule {
                    index,
                    test: rule.test.compile()?,
                    exclude: rule.exclude.as_ref().map(|e| e.compile()).transpose()?,
                    loader: rule.loader,
                    enforce: rule.enforce,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut optimization = None;
        for plugin in &config.plugins {
            if !MINIFY_PLUGIN_NAMES.contains(&plugin.name.as_str()) {
                continue;
            }
            if optimization.is_some() {
                return Err(BuildError::config("only one minify plugin may be configured"));
            }
            let include = plugin
                .pattern_option("include")
                .map_err(BuildError::Config)?
                .map(|p| p.compile())
                .transpose()?;
            let exclude = plugin
                .pattern_option("exclude")
                .map_err(BuildError::Config)?
                .map(|p| p.compile())
                .transpose()?;
            optimization = Some(OptimizationRule {
                include,
                exclude,
                source_map: plugin.bool_option("source_map").unwrap_or(true),
            });
        }

        let extensions = config
            .resolve
            .extensions
            .iter()
            .map(|ext| {
                if ext.is_empty() || ext.starts_with('.') {
                    ext.clone()
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();

        let descriptor = Self {
            root: config.root.clone(),
            entries,
            output: OutputDescriptor {
                dir: config.output_dir(),
                filename,
                library_target: config.output.library_target,
                library,
                umd_named_define: config.output.umd_named_define,
                manifest: config.output.manifest,
            },
            extensions,
            devtool: config.devtool,
            rules,
            optimization,
            plugins: config.plugins.clone(),
        };

        descriptor.validate()?;
        debug!(
            "Descriptor ready: {} entries, {} rules",
            descriptor.entries.len(),
            descriptor.rules.len()
        );

        Ok(descriptor)
    }

    /// Structural invariants that make a build impossible when violated
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(BuildError::config(
                "at least one entry must be specified in [entry]",
            ));
        }

        let mut names = HashSet::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                return Err(BuildError::config("entry names cannot be empty"));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(BuildError::config(format!(
                    "duplicate entry name `{}`",
                    entry.name
                )));
            }
        }

        if self.entries.len() > 1 && !self.output.filename.has_name() {
            return Err(BuildError::config(format!(
                "output.filename `{}` must contain [name] when more than one entry is declared",
                self.output.filename.as_str()
            )));
        }

        let mut filenames = HashSet::new();
        for artifact in self.artifacts() {
            if !filenames.insert(artifact.filename.clone()) {
                return Err(BuildError::config(format!(
                    "several entries would write to {}",
                    artifact.filename
                )));
            }
        }

        Ok(())
    }

    /// Add an entry point; the descriptor is left unchanged if it would
    /// become invalid
    pub fn add_entry(&mut self, entry: EntryPoint) -> Result<()> {
        self.entries.push(entry);
        if let Err(err) = self.validate() {
            self.entries.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Expand every entry into its artifact plan
    pub fn artifacts(&self) -> Vec<ArtifactPlan> {
        self.entries
            .iter()
            .map(|entry| {
                let filename = self.output.filename.expand(&entry.name, None);
                let minify = entry.minify.unwrap_or_else(|| {
                    self.optimization
                        .as_ref()
                        .map(|rule| rule.matches(&filename))
                        .unwrap_or(false)
                });
                ArtifactPlan {
                    name: entry.name.clone(),
                    filename,
                    minify,
                }
            })
            .collect()
    }

    /// Rules of one phase, in declaration order
    pub fn rules_in_phase(&self, phase: Option<Enforce>) -> impl Iterator<Item = &TransformRule> + '_ {
        self.rules.iter().filter(move |r| r.enforce == phase)
    }
}

fn entry_point(name: &str, entry: &EntryConfig) -> EntryPoint {
    EntryPoint {
        name: name.to_string(),
        request: entry.request().to_string(),
        minify: entry.minify(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;

    fn beam_config() -> Config {
        Config::library_template("Beam", "beam")
    }

    #[test]
    fn test_filename_template_expansion() {
        let template = FilenameTemplate::parse("[name].[contenthash:8].js").unwrap();
        assert!(template.has_name());
        assert!(template.has_hash());
        assert_eq!(template.expand("beam", None), "beam.00000000.js");
        assert_eq!(
            template.expand("beam", Some("0123456789abcdef")),
            "beam.01234567.js"
        );

        let plain = FilenameTemplate::parse("[name].js").unwrap();
        assert_eq!(plain.expand("beam.min", None), "beam.min.js");

        let unknown = FilenameTemplate::parse("[id]-[name].js").unwrap();
        assert_eq!(unknown.expand("a", None), "[id]-a.js");
    }

    #[test]
    fn test_filename_template_rejects_bad_hash_length() {
        assert!(FilenameTemplate::parse("[name].[contenthash:x].js").is_err());
        assert!(FilenameTemplate::parse("[name].[contenthash:0].js").is_err());
    }

    #[test]
    fn test_only_min_artifact_is_minified() {
        let descriptor = BuildDescriptor::from_config(&beam_config()).unwrap();
        let artifacts = descriptor.artifacts();

        assert_eq!(
            artifacts,
            vec![
                ArtifactPlan {
                    name: "beam".to_string(),
                    filename: "beam.js".to_string(),
                    minify: false,
                },
                ArtifactPlan {
                    name: "beam.min".to_string(),
                    filename: "beam.min.js".to_string(),
                    minify: true,
                },
            ]
        );
    }

    #[test]
    fn test_explicit_minify_flag_wins_over_pattern() {
        let mut config = beam_config();
        config.entry.insert(
            "beam".to_string(),
            EntryConfig::Detailed {
                import: "./source/index.ts".to_string(),
                minify: Some(true),
            },
        );
        config.entry.insert(
            "beam.min".to_string(),
            EntryConfig::Detailed {
                import: "./source/index.ts".to_string(),
                minify: Some(false),
            },
        );

        let descriptor = BuildDescriptor::from_config(&config).unwrap();
        let flags: Vec<bool> = descriptor.artifacts().iter().map(|a| a.minify).collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_filename_needs_name_placeholder() {
        let mut config = beam_config();
        config.output.filename = "bundle.js".to_string();

        let err = BuildDescriptor::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("[name]"));
    }

    #[test]
    fn test_add_entry_rejects_duplicates() {
        let mut descriptor = BuildDescriptor::from_config(&beam_config()).unwrap();
        let err = descriptor
            .add_entry(EntryPoint {
                name: "beam".to_string(),
                request: "./other.ts".to_string(),
                minify: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("duplicate entry name `beam`"));
    }

    #[test]
    fn test_add_entry_rejects_clashing_filename() {
        let mut config = beam_config();
        config.entry.shift_remove("beam.min");
        config.output.filename = "bundle.js".to_string();
        let mut descriptor = BuildDescriptor::from_config(&config).unwrap();

        let err = descriptor
            .add_entry(EntryPoint {
                name: "extra".to_string(),
                request: "./source/extra.ts".to_string(),
                minify: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("[name]"));
        assert_eq!(descriptor.entries.len(), 1);
        assert_eq!(descriptor.artifacts()[0].filename, "bundle.js");
    }

    #[test]
    fn test_add_entry_appends_valid_entry() {
        let mut descriptor = BuildDescriptor::from_config(&beam_config()).unwrap();
        descriptor
            .add_entry(EntryPoint {
                name: "beam.extra".to_string(),
                request: "./source/extra.ts".to_string(),
                minify: None,
            })
            .unwrap();
        let filenames: Vec<String> = descriptor.artifacts().into_iter().map(|a| a.filename).collect();
        assert_eq!(filenames, vec!["beam.js", "beam.min.js", "beam.extra.js"]);
    }

    #[test]
    fn test_artifacts_follow_declaration_order() {
        let config = Config::parse(
            "[entry]\nzeta = \"./z.ts\"\nalpha = \"./a.ts\"\n\"zeta.min\" = \"./z.ts\"\n",
        )
        .unwrap();
        let descriptor = BuildDescriptor::from_config(&config).unwrap();
        let names: Vec<String> = descriptor.artifacts().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "zeta.min"]);
    }

    #[test]
    fn test_no_entries_is_error() {
        let mut config = beam_config();
        config.entry.clear();
        assert!(BuildDescriptor::from_config(&config).is_err());
    }

    #[test]
    fn test_var_target_requires_library() {
        let mut config = beam_config();
        config.output.library_target = LibraryTarget::Var;
        config.output.library = None;
        assert!(BuildDescriptor::from_config(&config).is_err());
    }

    #[test]
    fn test_extensions_are_normalized() {
        let mut config = beam_config();
        config.resolve.extensions = vec!["ts".to_string(), ".js".to_string()];
        let descriptor = BuildDescriptor::from_config(&config).unwrap();
        assert_eq!(descriptor.extensions, vec![".ts", ".js"]);
    }

    #[test]
    fn test_invalid_rule_pattern() {
        let mut config = beam_config();
        config.module.rules[0].test = crate::config::PatternConfig::glob("[*.ts");
        let err = BuildDescriptor::from_config(&config).unwrap_err();
        assert!(matches!(err, BuildError::InvalidPattern { .. }));
    }
}
