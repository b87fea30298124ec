//! # Policy Configuration
//!
//! Transition timing can be overridden without recompiling: point `RECONCILE_POLICY`
//! at a JSON file and any field it names replaces the default. Fields a section leaves
//! out keep that operation's own default.
//!
//! ```json
//! {
//!   "adopt": { "wait_timeout": { "secs": 300, "nanos": 0 } },
//!   "forget": { "not_found_grace": 5 }
//! }
//! ```

use reconcile_engine::TransitionPolicy;
use std::path::{Path, PathBuf};
use tracing::info;

pub const POLICY_ENV: &str = "RECONCILE_POLICY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load the policy named by `RECONCILE_POLICY`, or the defaults when it is unset.
pub fn load_policy() -> Result<TransitionPolicy, ConfigError> {
    match std::env::var_os(POLICY_ENV) {
        Some(path) => load_policy_from(Path::new(&path)),
        None => Ok(TransitionPolicy::default()),
    }
}

pub fn load_policy_from(path: &Path) -> Result<TransitionPolicy, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let policy = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Loaded transition policy");
    Ok(policy)
}
