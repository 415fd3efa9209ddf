//! File and filename matchers used by rules and plugins

use std::fmt;
use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// A pattern as written in `umdpack.toml`
///
/// A plain string is a glob (`"*.ts"`), a table with a `regex` key is a
/// regular expression (`{ regex = "\\.ts$" }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternConfig {
    Glob(String),
    Regex { regex: String },
}

impl PatternConfig {
    pub fn glob(pattern: &str) -> Self {
        Self::Glob(pattern.to_string())
    }

    /// Compile into a matcher
    pub fn compile(&self) -> Result<Pattern> {
        match self {
            PatternConfig::Glob(source) => {
                // `*` must cross directory separators so `*.ts` matches absolute paths
                let glob = GlobBuilder::new(source)
                    .literal_separator(false)
                    .build()
                    .map_err(|e| BuildError::InvalidPattern {
                        pattern: source.clone(),
                        message: e.kind().to_string(),
                    })?;
                Ok(Pattern {
                    source: source.clone(),
                    kind: PatternKind::Glob(glob.compile_matcher()),
                })
            }
            PatternConfig::Regex { regex } => {
                let compiled = Regex::new(regex).map_err(|e| BuildError::InvalidPattern {
                    pattern: regex.clone(),
                    message: e.to_string(),
                })?;
                Ok(Pattern {
                    source: regex.clone(),
                    kind: PatternKind::Regex(compiled),
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
enum PatternKind {
    Glob(GlobMatcher),
    Regex(Regex),
}

/// A compiled pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
}

impl Pattern {
    /// Test a path (or bare filename); paths are normalized to forward slashes
    pub fn matches_path(&self, path: &Path) -> bool {
        self.matches(&path.to_string_lossy().replace('\\', "/"))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match &self.kind {
            PatternKind::Glob(glob) => glob.is_match(candidate),
            PatternKind::Regex(regex) => regex.is_match(candidate),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PatternKind::Glob(_) => write!(f, "{}", self.source),
            PatternKind::Regex(_) => write!(f, "/{}/", self.source),
        }
    }
}
