//! Session configuration, usually read from a `bitsolve.toml`.
//!
//! ```toml
//! initial_width = 32
//! engine = "z3"
//! z3_path = "/usr/local/bin/z3"
//! search_limit = 65536
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use bitsolve_engine::builtin::DEFAULT_SEARCH_LIMIT;
use bitsolve_engine::EngineKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid toml{}: {source}", located(.path))]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in '{}'", p.display()),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Starting literal width, before any declaration raises it.
    pub initial_width: u32,
    pub engine: EngineKind,
    /// Binary used by the `z3` engine.
    pub z3_path: PathBuf,
    /// Assignments the builtin engine tries before giving up on a query.
    pub search_limit: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_width: 0,
            engine: EngineKind::Builtin,
            z3_path: PathBuf::from("z3"),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Parse a TOML string directly.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse { path: None, source })
    }
}
