//! umdpack library
//!
//! Turns a declarative build description (`umdpack.toml`) into UMD bundles:
//! entries are resolved, every reached file runs through its transform
//! rules, each artifact is packaged, optionally minified, mapped and then
//! written in one all-or-nothing step.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod plugins;
pub mod resolver;
pub mod sourcemap;
pub mod transform;
pub mod utils;
pub mod watch;

pub use bundler::{BuildResult, Bundler};
pub use cli::{BuildOptions, Cli};
pub use config::{lint, BuildDescriptor, Config};
pub use error::{BuildError, Result};
