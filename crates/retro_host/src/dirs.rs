// crates/retro_host/src/dirs.rs

use std::ffi::{CStr, CString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

/// The fixed directory layout the core is told about through environment
/// queries: `system/`, `saves/` and `system/<core-name>/` under the content
/// root. Each directory is created on first query, before its path is
/// returned, and is never deleted by the bridge.
///
/// Paths are handed to the core as NUL-terminated strings; the backing
/// `CString`s live as long as this struct (i.e. as long as the bridge), so a
/// core that keeps the pointer around stays within its rights.
pub(crate) struct CoreDirs {
    system: PathBuf,
    saves: PathBuf,
    core_assets: PathBuf,
    system_c: OnceLock<CString>,
    saves_c: OnceLock<CString>,
    core_assets_c: OnceLock<CString>,
}

impl CoreDirs {
    pub(crate) fn new(root: &Path, core_name: &str) -> Self {
        let system = root.join("system");
        let core_assets = system.join(sanitize(core_name));
        Self {
            saves: root.join("saves"),
            system,
            core_assets,
            system_c: OnceLock::new(),
            saves_c: OnceLock::new(),
            core_assets_c: OnceLock::new(),
        }
    }

    pub(crate) fn system_dir(&self) -> io::Result<&CStr> {
        query(&self.system, &self.system_c)
    }

    pub(crate) fn save_dir(&self) -> io::Result<&CStr> {
        query(&self.saves, &self.saves_c)
    }

    pub(crate) fn core_assets_dir(&self) -> io::Result<&CStr> {
        query(&self.core_assets, &self.core_assets_c)
    }
}

fn query<'a>(path: &Path, slot: &'a OnceLock<CString>) -> io::Result<&'a CStr> {
    // create_dir_all is idempotent; running it on every query also heals a
    // directory that was removed behind our back.
    fs::create_dir_all(path)?;

    if let Some(c) = slot.get() {
        return Ok(c);
    }
    debug!(path = %path.display(), "directory created for environment query");
    let c = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "directory path contains NUL"))?;
    Ok(slot.get_or_init(|| c))
}

/// Core names come from the foreign library and may contain path separators
/// or other hostile characters; keep only a conservative set.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "core".to_string()
    } else {
        cleaned
    }
}
