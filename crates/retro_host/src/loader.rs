// crates/retro_host/src/loader.rs
//! Dynamic core loading using libloading.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::{debug, info};

use retro_abi::{
    AudioSampleBatchFn, AudioSampleFn, EnvironmentFn, GameInfo, InputPollFn, InputStateFn,
    SystemAvInfo, SystemInfo, VideoRefreshFn, API_VERSION,
};

use crate::error::HostError;

/// Every entry point a usable core must export, in resolution order.
/// Partial resolution is a hard failure, not a degraded mode.
pub const REQUIRED_SYMBOLS: [&str; 16] = [
    "retro_init",
    "retro_deinit",
    "retro_api_version",
    "retro_get_system_info",
    "retro_get_system_av_info",
    "retro_set_environment",
    "retro_set_video_refresh",
    "retro_set_audio_sample",
    "retro_set_audio_sample_batch",
    "retro_set_input_poll",
    "retro_set_input_state",
    "retro_load_game",
    "retro_unload_game",
    "retro_run",
    "retro_reset",
    "retro_set_controller_port_device",
];

/// The resolved entry points of a loaded core. Created once per successful
/// load and immutable thereafter; every field is non-null by construction.
#[derive(Clone, Copy)]
pub struct EntryPoints {
    pub init: unsafe extern "C" fn(),
    pub deinit: unsafe extern "C" fn(),
    pub api_version: unsafe extern "C" fn() -> u32,
    pub get_system_info: unsafe extern "C" fn(*mut SystemInfo),
    pub get_system_av_info: unsafe extern "C" fn(*mut SystemAvInfo),
    pub set_environment: unsafe extern "C" fn(EnvironmentFn),
    pub set_video_refresh: unsafe extern "C" fn(VideoRefreshFn),
    pub set_audio_sample: unsafe extern "C" fn(AudioSampleFn),
    pub set_audio_sample_batch: unsafe extern "C" fn(AudioSampleBatchFn),
    pub set_input_poll: unsafe extern "C" fn(InputPollFn),
    pub set_input_state: unsafe extern "C" fn(InputStateFn),
    pub load_game: unsafe extern "C" fn(*const GameInfo) -> bool,
    pub unload_game: unsafe extern "C" fn(),
    pub run: unsafe extern "C" fn(),
    pub reset: unsafe extern "C" fn(),
    pub set_controller_port_device: unsafe extern "C" fn(u32, u32),
}

/// Safe identity of a loaded core, copied out of `retro_get_system_info`.
#[derive(Debug, Clone)]
pub struct CoreIdentity {
    pub name: String,
    pub version: String,
    /// Core wants a content path instead of the content bytes.
    pub need_fullpath: bool,
}

/// A loaded core: the open library handle plus its resolved entry points.
///
/// The handle is owned exclusively by this struct and released exactly once,
/// on drop. The session layer guarantees the core's deinit entry point has
/// returned before that happens.
pub struct CoreLibrary {
    pub(crate) lib: Library,
    pub entry: EntryPoints,
    pub identity: CoreIdentity,
    pub path: PathBuf,
}

macro_rules! resolve {
    ($lib:expr, $name:literal, $ty:ty) => {{
        let sym: Symbol<$ty> = unsafe { $lib.get(concat!($name, "\0").as_bytes()) }
            .map_err(|_| HostError::SymbolMissing($name))?;
        *sym
    }};
}

impl CoreLibrary {
    /// Open the shared library at `path` with lazy symbol binding and
    /// resolve all required entry points, failing fast on the first missing
    /// symbol. No retries: failures are permanent for this path.
    ///
    /// # Safety
    ///
    /// Loading a core executes arbitrary foreign code (library constructors
    /// run inside this call). The caller must trust the library at `path` to
    /// be a well-formed core for the ABI this host implements.
    pub unsafe fn load(path: &Path) -> Result<Self, HostError> {
        let lib = open_lazy(path).map_err(|e| HostError::LoadFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let entry = EntryPoints {
            init: resolve!(lib, "retro_init", unsafe extern "C" fn()),
            deinit: resolve!(lib, "retro_deinit", unsafe extern "C" fn()),
            api_version: resolve!(lib, "retro_api_version", unsafe extern "C" fn() -> u32),
            get_system_info: resolve!(
                lib,
                "retro_get_system_info",
                unsafe extern "C" fn(*mut SystemInfo)
            ),
            get_system_av_info: resolve!(
                lib,
                "retro_get_system_av_info",
                unsafe extern "C" fn(*mut SystemAvInfo)
            ),
            set_environment: resolve!(
                lib,
                "retro_set_environment",
                unsafe extern "C" fn(EnvironmentFn)
            ),
            set_video_refresh: resolve!(
                lib,
                "retro_set_video_refresh",
                unsafe extern "C" fn(VideoRefreshFn)
            ),
            set_audio_sample: resolve!(
                lib,
                "retro_set_audio_sample",
                unsafe extern "C" fn(AudioSampleFn)
            ),
            set_audio_sample_batch: resolve!(
                lib,
                "retro_set_audio_sample_batch",
                unsafe extern "C" fn(AudioSampleBatchFn)
            ),
            set_input_poll: resolve!(lib, "retro_set_input_poll", unsafe extern "C" fn(InputPollFn)),
            set_input_state: resolve!(
                lib,
                "retro_set_input_state",
                unsafe extern "C" fn(InputStateFn)
            ),
            load_game: resolve!(
                lib,
                "retro_load_game",
                unsafe extern "C" fn(*const GameInfo) -> bool
            ),
            unload_game: resolve!(lib, "retro_unload_game", unsafe extern "C" fn()),
            run: resolve!(lib, "retro_run", unsafe extern "C" fn()),
            reset: resolve!(lib, "retro_reset", unsafe extern "C" fn()),
            set_controller_port_device: resolve!(
                lib,
                "retro_set_controller_port_device",
                unsafe extern "C" fn(u32, u32)
            ),
        };

        // ABI revision gate: part of the init path, permanent for this load.
        let version = unsafe { (entry.api_version)() };
        if version != API_VERSION {
            return Err(HostError::InitializationFailure(format!(
                "core speaks ABI version {version}, host supports {API_VERSION}"
            )));
        }

        let identity = unsafe { read_identity(&entry) };
        info!(
            core = %identity.name,
            version = %identity.version,
            path = %path.display(),
            "core library loaded"
        );

        Ok(Self {
            lib,
            entry,
            identity,
            path: path.to_path_buf(),
        })
    }
}

/// Copy the core's static identity strings into owned data.
unsafe fn read_identity(entry: &EntryPoints) -> CoreIdentity {
    let mut info = SystemInfo::zeroed();
    unsafe { (entry.get_system_info)(&mut info) };

    let read = |ptr: *const std::ffi::c_char, fallback: &str| -> String {
        if ptr.is_null() {
            fallback.to_string()
        } else {
            // SAFETY: non-null string from retro_get_system_info points into
            // the core's static data and stays valid while the library is open.
            unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
        }
    };

    CoreIdentity {
        name: read(info.library_name, "unknown"),
        version: read(info.library_version, "unknown"),
        need_fullpath: info.need_fullpath,
    }
}

/// Open with lazy binding where the platform supports it. Cores reference
/// frontend-version symbols they never call on this host; lazy binding keeps
/// those from failing the load.
fn open_lazy(path: &Path) -> Result<Library, libloading::Error> {
    #[cfg(unix)]
    {
        use libloading::os::unix;
        debug!(path = %path.display(), "opening core with RTLD_LAZY | RTLD_LOCAL");
        let lib = unsafe { unix::Library::open(Some(path), unix::RTLD_LAZY | unix::RTLD_LOCAL) }?;
        Ok(lib.into())
    }
    #[cfg(not(unix))]
    {
        unsafe { Library::new(path) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_nonexistent_library_fails() {
        let result = unsafe { CoreLibrary::load(Path::new("/nonexistent/libcore_xyz.so")) };
        match result {
            Err(HostError::LoadFailure { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/libcore_xyz.so"));
            }
            other => panic!("expected LoadFailure, got {:?}", other.err()),
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn foreign_library_without_entry_points_names_the_first_symbol() {
        // libm opens on every glibc system and exports none of the required
        // entry points, so resolution must fail on the first one.
        let result = unsafe { CoreLibrary::load(Path::new("libm.so.6")) };
        match result {
            Err(HostError::SymbolMissing(name)) => assert_eq!(name, "retro_init"),
            other => panic!("expected SymbolMissing, got {:?}", other.err()),
        }
    }

    #[test]
    fn required_symbols_cover_every_entry_point() {
        // One name per EntryPoints field, init first so a stub library
        // missing everything reports retro_init.
        assert_eq!(REQUIRED_SYMBOLS.len(), 16);
        assert_eq!(REQUIRED_SYMBOLS[0], "retro_init");
        assert!(REQUIRED_SYMBOLS.contains(&"retro_set_environment"));
        assert!(REQUIRED_SYMBOLS.contains(&"retro_run"));
        // No duplicates.
        let mut sorted = REQUIRED_SYMBOLS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), REQUIRED_SYMBOLS.len());
    }
}
