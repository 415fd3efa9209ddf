//! Descriptor lint
//!
//! Checks that do not make a build impossible on their own but usually mean
//! the configuration does not do what its author expects.

use std::fmt;
use std::sync::Arc;

use super::descriptor::BuildDescriptor;
use super::schema::LibraryTarget;
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Lint a descriptor; diagnostics come back in a stable order
pub fn lint(descriptor: &Arc<BuildDescriptor>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let resolver = Resolver::new(descriptor.clone());

    for entry in &descriptor.entries {
        if let Err(err) = resolver.resolve_entry(entry) {
            diagnostics.push(Diagnostic::error(format!("entry `{}`: {}", entry.name, err)));
            continue;
        }

        let candidates = resolver.candidates(&descriptor.root.join(&entry.request));
        if candidates.len() > 1 {
            let names = candidates
                .iter()
                .map(|c| c.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.push(Diagnostic::warning(format!(
                "entry `{}` is ambiguous: {} all match, the first one is used",
                entry.name, names
            )));
        }
    }

    let artifacts = descriptor.artifacts();
    if let Some(rule) = &descriptor.optimization {
        match &rule.include {
            Some(include) => {
                if !artifacts.iter().any(|a| include.matches(&a.filename)) {
                    diagnostics.push(Diagnostic::warning(format!(
                        "minify include pattern `{}` matches none of: {}",
                        include,
                        artifacts
                            .iter()
                            .map(|a| a.filename.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                }
            }
            None => {
                if !descriptor.entries.iter().any(|e| e.minify == Some(true)) {
                    diagnostics.push(Diagnostic::warning(
                        "minify plugin has no include pattern and no entry sets minify = true",
                    ));
                }
            }
        }
    }

    if descriptor.output.library_target == LibraryTarget::Umd && descriptor.output.library.is_none()
    {
        diagnostics.push(Diagnostic::warning(
            "umd output without output.library copies exports onto the global object",
        ));
    }

    diagnostics
}
