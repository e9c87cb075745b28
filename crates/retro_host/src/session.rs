// crates/retro_host/src/session.rs
//! Session lifecycle: load the core, wire the callbacks, pump frames, tear
//! down in an order the core can survive.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use libloading::Library;
use tracing::{debug, info, warn};

use retro_abi::{GameInfo, SystemAvInfo, DEVICE_JOYPAD};

use crate::audio::AudioBatch;
use crate::bridge::{self, BridgeShared};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::hw_render::HwRenderDelegate;
use crate::input::{InputBridge, MAX_PORTS};
use crate::loader::{CoreIdentity, CoreLibrary, EntryPoints};
use crate::pump::{FramePacer, FramePump, TickOutcome};
use crate::video::FrameEvent;

/// Frames the embedder may fall behind before new frames are dropped.
const FRAME_CHANNEL_CAPACITY: usize = 4;
/// Audio batches buffered ahead of the embedder's playback drain.
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// Where a session is in its lifecycle. Transitions only move forward;
/// a failed content load is the one place the machine holds position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Library loaded and callbacks wired, core init complete, no content.
    Initialized,
    /// Content accepted; AV info is known.
    GameLoaded,
    /// At least one frame has run.
    Running,
    /// Torn down. Terminal.
    Stopped,
}

/// One loaded core plus everything needed to run it.
///
/// At most one session is live per process: the callback signatures carry no
/// context pointer, so they route through a single global slot that this
/// session claims on load and releases on stop.
pub struct Session {
    // `None` only for test sessions built around an in-process core.
    lib: Option<Library>,
    entry: EntryPoints,
    identity: CoreIdentity,
    shared: Arc<BridgeShared>,
    pump: FramePump,
    state: SessionState,
    frames: Receiver<FrameEvent>,
    audio: Receiver<AudioBatch>,
    game_path: Option<PathBuf>,
}

impl Session {
    /// Load the core at `core_path` and bring it to [`SessionState::Initialized`]:
    /// open the library, resolve the entry points, claim the global bridge
    /// slot, hand the core its callbacks and run its init entry point.
    ///
    /// # Safety
    ///
    /// Executes foreign code from the library at `core_path`; the caller
    /// must trust it to be a well-formed core.
    pub unsafe fn load(core_path: &Path, config: HostConfig) -> Result<Self, HostError> {
        let core = unsafe { CoreLibrary::load(core_path)? };
        let CoreLibrary {
            lib,
            entry,
            identity,
            ..
        } = core;
        unsafe { Self::attach(entry, identity, config, Some(lib)) }
    }

    /// Wire an already-resolved core. Shared by [`Session::load`] and the
    /// in-process test cores.
    pub(crate) unsafe fn attach(
        entry: EntryPoints,
        identity: CoreIdentity,
        config: HostConfig,
        lib: Option<Library>,
    ) -> Result<Self, HostError> {
        let (frame_tx, frame_rx) = bounded(FRAME_CHANNEL_CAPACITY);
        let (audio_tx, audio_rx) = bounded(AUDIO_CHANNEL_CAPACITY);
        let shared = Arc::new(BridgeShared::new(
            &config,
            &identity.name,
            frame_tx,
            audio_tx,
        ));
        // Claim the slot before the core can issue a single callback.
        bridge::install(Arc::clone(&shared))?;

        // Environment first, then init, then the streaming callbacks: cores
        // negotiate during init and may not tolerate another order.
        unsafe {
            (entry.set_environment)(bridge::environment_trampoline);
            (entry.init)();
            (entry.set_video_refresh)(bridge::video_refresh_trampoline);
            (entry.set_audio_sample)(bridge::audio_sample_trampoline);
            (entry.set_audio_sample_batch)(bridge::audio_sample_batch_trampoline);
            (entry.set_input_poll)(bridge::input_poll_trampoline);
            (entry.set_input_state)(bridge::input_state_trampoline);
        }

        info!(core = %identity.name, version = %identity.version, "session initialized");
        Ok(Self {
            lib,
            entry,
            identity,
            shared,
            pump: FramePump::new(),
            state: SessionState::Initialized,
            frames: frame_rx,
            audio: audio_rx,
            game_path: None,
        })
    }

    /// Hand content to the core. `None` starts the core without content,
    /// which only works if it declared contentless support during init.
    ///
    /// A refusal leaves the session in [`SessionState::Initialized`]; the
    /// caller may retry with different content.
    pub fn load_game(&mut self, content: Option<&Path>) -> Result<(), HostError> {
        if self.state != SessionState::Initialized {
            return Err(HostError::InvalidState(self.state));
        }

        // Whatever backs the GameInfo pointers must outlive the call.
        let mut path_c: Option<CString> = None;
        let mut bytes: Option<Vec<u8>> = None;

        let info = match content {
            None => {
                if !self
                    .shared
                    .flags
                    .support_no_game
                    .load(std::sync::atomic::Ordering::Relaxed)
                {
                    return Err(HostError::GameLoadFailure {
                        path: PathBuf::new(),
                        reason: "core does not support contentless start".to_string(),
                    });
                }
                GameInfo {
                    path: std::ptr::null(),
                    data: std::ptr::null(),
                    size: 0,
                    meta: std::ptr::null(),
                }
            }
            Some(path) => {
                let c = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
                    HostError::GameLoadFailure {
                        path: path.to_path_buf(),
                        reason: "content path contains NUL".to_string(),
                    }
                })?;
                let (data, size) = if self.identity.need_fullpath {
                    // Core opens the file itself; only verify it exists.
                    if !path.is_file() {
                        return Err(HostError::GameLoadFailure {
                            path: path.to_path_buf(),
                            reason: "content file not found".to_string(),
                        });
                    }
                    (std::ptr::null(), 0)
                } else {
                    let content =
                        std::fs::read(path).map_err(|e| HostError::GameLoadFailure {
                            path: path.to_path_buf(),
                            reason: e.to_string(),
                        })?;
                    let b = bytes.insert(content);
                    (b.as_ptr() as *const std::ffi::c_void, b.len())
                };
                let path_ptr = path_c.insert(c).as_ptr();
                GameInfo {
                    path: path_ptr,
                    data,
                    size,
                    meta: std::ptr::null(),
                }
            }
        };

        // SAFETY: entry points of the live core; `info`'s backing storage
        // (path_c, bytes) outlives the call.
        let accepted = unsafe { (self.entry.load_game)(&info) };
        drop(bytes);
        drop(path_c);
        if !accepted {
            warn!(content = ?content, "core refused the content");
            return Err(HostError::GameLoadFailure {
                path: content.map(Path::to_path_buf).unwrap_or_default(),
                reason: "retro_load_game returned false".to_string(),
            });
        }

        let mut av = SystemAvInfo::default();
        // SAFETY: only valid after a successful load_game, which is where we are.
        unsafe { (self.entry.get_system_av_info)(&mut av) };
        self.shared.video.set_av_info(av);

        // Plug a joypad into every port we track.
        for port in 0..MAX_PORTS as u32 {
            // SAFETY: entry point of the live core.
            unsafe { (self.entry.set_controller_port_device)(port, DEVICE_JOYPAD) };
        }

        // If the core negotiated a GPU context during load, it now needs the
        // reset hook before its first frame.
        self.shared.hw.fire_context_reset();

        info!(
            width = av.geometry.base_width,
            height = av.geometry.base_height,
            fps = av.timing.fps,
            sample_rate = av.timing.sample_rate,
            "content loaded"
        );
        self.game_path = content.map(Path::to_path_buf);
        self.state = SessionState::GameLoaded;
        Ok(())
    }

    /// Run one frame: snapshot input, execute the core's run entry point,
    /// flush buffered single audio samples. Ticks that overlap an in-flight
    /// frame are dropped, not queued.
    pub fn run_frame(&mut self) -> Result<TickOutcome, HostError> {
        match self.state {
            SessionState::GameLoaded | SessionState::Running => {}
            other => return Err(HostError::InvalidState(other)),
        }
        self.state = SessionState::Running;

        let entry = self.entry;
        let shared = &self.shared;
        let outcome = self.pump.tick(|| {
            shared.input.begin_frame();
            // SAFETY: the pump guarantees no concurrent run call, and the
            // session owns the library for the duration.
            unsafe { (entry.run)() };
            shared.audio.flush_pending();
        });
        Ok(outcome)
    }

    /// Reset the core to its power-on state without reloading content.
    pub fn reset(&mut self) -> Result<(), HostError> {
        match self.state {
            SessionState::GameLoaded | SessionState::Running => {}
            other => return Err(HostError::InvalidState(other)),
        }
        // SAFETY: valid in these states per the core contract.
        unsafe { (self.entry.reset)() };
        Ok(())
    }

    /// Tear the session down. Idempotent. Ordering is load-bearing: the
    /// pump dies first so no frame can run mid-teardown, then the core's
    /// unload and deinit entry points, then the GPU context, then the slot,
    /// and the library handle is dropped last of all.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.pump.invalidate();
        // SAFETY: entry points of the still-loaded library; unload only
        // after a successful content load.
        unsafe {
            if matches!(self.state, SessionState::GameLoaded | SessionState::Running) {
                (self.entry.unload_game)();
            }
            (self.entry.deinit)();
        }
        self.shared.hw.release();
        bridge::release_if_owner(&self.shared);
        self.lib.take();
        self.state = SessionState::Stopped;
        info!(
            core = %self.identity.name,
            dropped_ticks = self.pump.dropped_ticks(),
            "session stopped"
        );
    }

    /// Install the embedder's GPU plumbing. Must happen before
    /// [`Session::load_game`]; cores negotiate their context during load.
    pub fn set_hw_render_delegate(&self, delegate: Box<dyn HwRenderDelegate>) {
        if self.state != SessionState::Initialized {
            debug!("render delegate installed after content load; cores negotiate during load");
        }
        self.shared.hw.set_delegate(delegate);
    }

    /// Override a core config variable; the core picks it up through its
    /// variable-update poll.
    pub fn set_core_option(&self, key: &str, value: &str) {
        self.shared.options.set(key, value);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_game_loaded(&self) -> bool {
        matches!(self.state, SessionState::GameLoaded | SessionState::Running)
    }

    pub fn identity(&self) -> &CoreIdentity {
        &self.identity
    }

    pub fn av_info(&self) -> Option<SystemAvInfo> {
        self.shared.video.av_info()
    }

    /// Pacer matching the core's reported frame rate.
    pub fn pacer(&self) -> FramePacer {
        let fps = self.av_info().map(|av| av.timing.fps).unwrap_or(60.0);
        FramePacer::from_fps(fps)
    }

    /// Handle for feeding controller state; safe to use from any thread.
    pub fn input(&self) -> Arc<InputBridge> {
        Arc::clone(&self.shared.input)
    }

    /// Video frames published by the core, newest dropped when full.
    pub fn frames(&self) -> &Receiver<FrameEvent> {
        &self.frames
    }

    /// Audio batches published by the core.
    pub fn audio(&self) -> &Receiver<AudioBatch> {
        &self.audio
    }

    /// True once the core has asked the host to end the session.
    pub fn shutdown_requested(&self) -> bool {
        self.shared
            .flags
            .shutdown
            .load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.pump.dropped_ticks()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
