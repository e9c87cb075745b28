// crates/retro_host/src/bridge.rs
//! The callback bridge between the loaded core and the host.
//!
//! The foreign callback signatures carry no user-data pointer, so the
//! receiving functions must find their state globally. A single static slot
//! holds the active bridge; installing a second one fails, which is what
//! makes the one-session-at-a-time rule enforceable at all.

use std::ffi::{c_void, CString};
use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::audio::{AudioBatch, AudioBridge};
use crate::config::HostConfig;
use crate::dirs::CoreDirs;
use crate::error::HostError;
use crate::hw_render::HwBridge;
use crate::input::InputBridge;
use crate::variables::OptionStore;
use crate::video::{FrameEvent, VideoBridge};

/// Session-scoped toggles the core flips through environment commands.
pub(crate) struct SessionFlags {
    /// Core asked the host to end the session.
    pub(crate) shutdown: AtomicBool,
    /// Core can run without content.
    pub(crate) support_no_game: AtomicBool,
    /// Advisory performance class the core declared.
    pub(crate) performance_level: AtomicU32,
}

/// Everything a callback can reach, bundled so the trampolines clone one
/// `Arc` out of the slot and work lock-free from there.
pub(crate) struct BridgeShared {
    pub(crate) video: VideoBridge,
    pub(crate) audio: AudioBridge,
    pub(crate) input: Arc<InputBridge>,
    pub(crate) dirs: CoreDirs,
    pub(crate) options: OptionStore,
    pub(crate) hw: HwBridge,
    pub(crate) flags: SessionFlags,
    pub(crate) username: Option<CString>,
}

impl BridgeShared {
    pub(crate) fn new(
        config: &HostConfig,
        core_name: &str,
        frames: crossbeam_channel::Sender<FrameEvent>,
        batches: crossbeam_channel::Sender<AudioBatch>,
    ) -> Self {
        let username = config
            .username
            .as_deref()
            .and_then(|name| CString::new(name).ok());
        Self {
            video: VideoBridge::new(frames),
            audio: AudioBridge::new(batches),
            input: Arc::new(InputBridge::new()),
            dirs: CoreDirs::new(&config.content_root, core_name),
            options: OptionStore::new(&config.core_options),
            hw: HwBridge::new(),
            flags: SessionFlags {
                shutdown: AtomicBool::new(false),
                support_no_game: AtomicBool::new(false),
                performance_level: AtomicU32::new(0),
            },
            username,
        }
    }
}

/// The one slot the trampolines read. Held only long enough to clone the
/// `Arc`; no callback work ever runs under this lock.
static ACTIVE: Mutex<Option<Arc<BridgeShared>>> = Mutex::new(None);

/// Claim the slot for `bridge`. Fails if another session's bridge is still
/// installed; the occupant is left untouched.
pub(crate) fn install(bridge: Arc<BridgeShared>) -> Result<(), HostError> {
    let mut slot = lock_slot();
    if slot.is_some() {
        return Err(HostError::SessionActive);
    }
    *slot = Some(bridge);
    Ok(())
}

/// Release the slot, but only if `bridge` is the installed occupant. A stale
/// handle from an already-stopped session must not evict its successor.
pub(crate) fn release_if_owner(bridge: &Arc<BridgeShared>) {
    let mut slot = lock_slot();
    if slot.as_ref().is_some_and(|active| Arc::ptr_eq(active, bridge)) {
        *slot = None;
    }
}

/// Run `f` against the active bridge, if any. The slot lock is dropped
/// before `f` runs.
pub(crate) fn with_bridge<R>(f: impl FnOnce(&BridgeShared) -> R) -> Option<R> {
    let bridge = lock_slot().clone()?;
    Some(f(&bridge))
}

fn lock_slot() -> std::sync::MutexGuard<'static, Option<Arc<BridgeShared>>> {
    ACTIVE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Serializes every test that touches the process-global slot, across
/// modules; cargo runs tests in parallel threads.
#[cfg(test)]
pub(crate) static SLOT_TEST_LOCK: Mutex<()> = Mutex::new(());

// The trampolines handed to the core. Each one resolves the active bridge
// and forwards; with no bridge installed they answer with the most
// conservative value the signature allows.

pub(crate) extern "C" fn environment_trampoline(cmd: u32, data: *mut c_void) -> bool {
    match with_bridge(|b| crate::environment::dispatch(b, cmd, data)) {
        Some(answer) => answer,
        None => {
            warn!(cmd, "environment callback with no active bridge");
            false
        }
    }
}

pub(crate) extern "C" fn video_refresh_trampoline(
    data: *const c_void,
    width: u32,
    height: u32,
    pitch: usize,
) {
    with_bridge(|b| b.video.on_refresh(data, width, height, pitch));
}

pub(crate) extern "C" fn audio_sample_trampoline(left: i16, right: i16) {
    with_bridge(|b| b.audio.on_sample(left, right));
}

pub(crate) extern "C" fn audio_sample_batch_trampoline(data: *const i16, frames: usize) -> usize {
    if data.is_null() || frames == 0 {
        return 0;
    }
    with_bridge(|b| {
        // SAFETY: non-null buffer of `frames` interleaved stereo pairs,
        // valid for the duration of the callback.
        let pcm = unsafe { std::slice::from_raw_parts(data, frames * 2) };
        b.audio.on_batch(pcm, frames)
    })
    // With no bridge, claim everything consumed so the core does not retry.
    .unwrap_or(frames)
}

pub(crate) extern "C" fn input_poll_trampoline() {
    // Input snapshots are taken by the frame pump before each run call, so
    // the poll itself has nothing left to do.
}

pub(crate) extern "C" fn input_state_trampoline(
    port: u32,
    device: u32,
    index: u32,
    id: u32,
) -> i16 {
    with_bridge(|b| b.input.query(port, device, index, id)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use retro_abi::{JoypadButton, DEVICE_JOYPAD};

    fn test_bridge(tag: &str) -> Arc<BridgeShared> {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let config = HostConfig {
            content_root: std::env::temp_dir().join(format!("retro_bridge_{tag}_{ts}")),
            ..HostConfig::default()
        };
        let (frame_tx, _frame_rx) = bounded(8);
        let (audio_tx, _audio_rx) = bounded(8);
        Arc::new(BridgeShared::new(&config, "BridgeTestCore", frame_tx, audio_tx))
    }

    #[test]
    fn second_install_fails_and_leaves_the_occupant() {
        let _guard = SLOT_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let first = test_bridge("first");
        let second = test_bridge("second");

        install(Arc::clone(&first)).unwrap();
        assert!(matches!(
            install(Arc::clone(&second)),
            Err(HostError::SessionActive)
        ));

        // A non-owner release must not evict the occupant.
        release_if_owner(&second);
        assert!(with_bridge(|_| ()).is_some());

        release_if_owner(&first);
        assert!(with_bridge(|_| ()).is_none());
    }

    #[test]
    fn trampolines_answer_conservatively_with_no_bridge() {
        let _guard = SLOT_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert!(with_bridge(|_| ()).is_none());

        assert!(!environment_trampoline(3, std::ptr::null_mut()));
        assert_eq!(input_state_trampoline(0, DEVICE_JOYPAD, 0, JoypadButton::A as u32), 0);
        let pcm = [0i16; 2];
        assert_eq!(audio_sample_batch_trampoline(pcm.as_ptr(), 1), 1);
        video_refresh_trampoline(std::ptr::null(), 0, 0, 0);
        input_poll_trampoline();
    }

    #[test]
    fn trampolines_route_to_the_installed_bridge() {
        let _guard = SLOT_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let bridge = test_bridge("routed");
        install(Arc::clone(&bridge)).unwrap();

        bridge.input.set_button(0, JoypadButton::A, true);
        bridge.input.begin_frame();
        assert_eq!(
            input_state_trampoline(0, DEVICE_JOYPAD, 0, JoypadButton::A as u32),
            1
        );

        release_if_owner(&bridge);
    }
}
