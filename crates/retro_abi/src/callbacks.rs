// crates/retro_abi/src/callbacks.rs
//! Shapes of the five steady-state callbacks plus the environment entry
//! point. None of them carries a user-data parameter; the host side routes
//! them through its single active bridge instance.

use core::ffi::c_void;

/// The plugin-to-host query/configuration channel. The payload's expected
/// type is determined solely by `cmd`; see `environment` for the codes.
pub type EnvironmentFn = extern "C" fn(cmd: u32, data: *mut c_void) -> bool;

/// One video frame. `data` is null for a duplicate frame, the
/// [`HW_FRAME_BUFFER_VALID`] sentinel on the hardware-render path, or a
/// pixel buffer valid only for the duration of the call.
pub type VideoRefreshFn = extern "C" fn(data: *const c_void, width: u32, height: u32, pitch: usize);

/// A single stereo sample pair.
pub type AudioSampleFn = extern "C" fn(left: i16, right: i16);

/// A batch of interleaved stereo samples; returns how many frames were
/// consumed. The buffer is valid only for the duration of the call.
pub type AudioSampleBatchFn = extern "C" fn(data: *const i16, frames: usize) -> usize;

/// "About to read input"; the host may refresh device snapshots here.
pub type InputPollFn = extern "C" fn();

/// Input-state query: (port, device class, index, button/axis id) -> value.
pub type InputStateFn = extern "C" fn(port: u32, device: u32, index: u32, id: u32) -> i16;

/// Sentinel `data` pointer in the video-refresh callback meaning "the frame
/// was rendered into the framebuffer the host handed out via the
/// hardware-render context", i.e. `(void*)-1` in the C header.
pub const HW_FRAME_BUFFER_VALID: *const c_void = usize::MAX as *const c_void;
