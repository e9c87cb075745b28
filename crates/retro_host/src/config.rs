// crates/retro_host/src/config.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Host-side configuration handed to [`crate::session::Session::load`].
///
/// `content_root` is the directory the core is told about through the
/// environment queries; the bridge creates `system/`, `saves/` and
/// `system/<core-name>/` under it on demand and never deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub content_root: PathBuf,

    /// Default values for core config variables, keyed by variable name.
    /// Unknown keys queried by the core are declined, which the core must
    /// tolerate.
    #[serde(default)]
    pub core_options: HashMap<String, String>,

    /// Answer for the username query; declined when unset.
    #[serde(default)]
    pub username: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("retro"),
            core_options: HashMap::new(),
            username: None,
        }
    }
}

impl HostConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, HostError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
