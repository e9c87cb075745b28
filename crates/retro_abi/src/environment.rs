// crates/retro_abi/src/environment.rs
//! Environment command codes and their payload structs.
//!
//! This is a foreign-defined tagged-union protocol: an integer command code
//! implies the payload type, with no runtime check. Only the commands this
//! host interprets (plus the few it deliberately acknowledges or declines)
//! are listed; unknown codes must be declined, not treated as errors.

use core::ffi::{c_char, c_void};

pub const ENV_SET_ROTATION: u32 = 1;
pub const ENV_GET_OVERSCAN: u32 = 2;
pub const ENV_GET_CAN_DUPE: u32 = 3;
pub const ENV_SET_MESSAGE: u32 = 6;
pub const ENV_SHUTDOWN: u32 = 7;
pub const ENV_SET_PERFORMANCE_LEVEL: u32 = 8;
pub const ENV_GET_SYSTEM_DIRECTORY: u32 = 9;
pub const ENV_SET_PIXEL_FORMAT: u32 = 10;
pub const ENV_SET_INPUT_DESCRIPTORS: u32 = 11;
pub const ENV_SET_HW_RENDER: u32 = 14;
pub const ENV_GET_VARIABLE: u32 = 15;
pub const ENV_SET_VARIABLES: u32 = 16;
pub const ENV_GET_VARIABLE_UPDATE: u32 = 17;
pub const ENV_SET_SUPPORT_NO_GAME: u32 = 18;
pub const ENV_GET_LOG_INTERFACE: u32 = 27;
pub const ENV_GET_CORE_ASSETS_DIRECTORY: u32 = 30;
pub const ENV_GET_SAVE_DIRECTORY: u32 = 31;
pub const ENV_SET_SYSTEM_AV_INFO: u32 = 32;
pub const ENV_SET_GEOMETRY: u32 = 37;
pub const ENV_GET_USERNAME: u32 = 38;
pub const ENV_GET_LANGUAGE: u32 = 39;

/// Payload of `ENV_GET_VARIABLE` (core fills `key`, host fills `value`) and
/// element type of the `ENV_SET_VARIABLES` array (terminated by a null key).
/// A `SET_VARIABLES` value has the form `"Description; option1|option2"`.
#[repr(C)]
pub struct Variable {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// Payload of `ENV_SET_MESSAGE`.
#[repr(C)]
pub struct Message {
    pub msg: *const c_char,
    pub frames: u32,
}

/// The core-side log sink. The real signature is printf-style variadic;
/// stable Rust can declare (and transmute to) the variadic pointer type but
/// not define such a function, so hosts fill this with a two-argument
/// function and log the format string verbatim.
pub type LogPrintfFn = unsafe extern "C" fn(level: u32, fmt: *const c_char, ...);

/// Payload of `ENV_GET_LOG_INTERFACE`; the host fills `log`.
#[repr(C)]
pub struct LogCallback {
    pub log: Option<LogPrintfFn>,
}

/// Hardware-render context types (`HwRenderCallback::context_type`).
pub const HW_CONTEXT_NONE: u32 = 0;
pub const HW_CONTEXT_OPENGL: u32 = 1;
pub const HW_CONTEXT_OPENGLES2: u32 = 2;
pub const HW_CONTEXT_OPENGL_CORE: u32 = 3;
pub const HW_CONTEXT_OPENGLES3: u32 = 4;

/// Core-side context hook; calling it executes foreign code.
pub type HwContextResetFn = unsafe extern "C" fn();
pub type HwGetCurrentFramebufferFn = extern "C" fn() -> usize;
pub type HwGetProcAddressFn = extern "C" fn(sym: *const c_char) -> *const c_void;

/// Payload of `ENV_SET_HW_RENDER`. The core fills the context request and its
/// reset/destroy hooks; an accepting host fills `get_current_framebuffer` and
/// `get_proc_address` before returning true.
#[repr(C)]
pub struct HwRenderCallback {
    pub context_type: u32,
    pub context_reset: Option<HwContextResetFn>,
    pub get_current_framebuffer: Option<HwGetCurrentFramebufferFn>,
    pub get_proc_address: Option<HwGetProcAddressFn>,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub version_major: u32,
    pub version_minor: u32,
    pub cache_context: bool,
    pub context_destroy: Option<HwContextResetFn>,
    pub debug_context: bool,
}
