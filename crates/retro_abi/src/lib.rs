// crates/retro_abi/src/lib.rs
//! FFI contract between the host and libretro-style cores.
//!
//! Everything here is `#[repr(C)]` or a plain `extern "C"` function type and
//! mirrors the foreign header field for field. Both the host crate and the
//! `sample_core` cdylib compile against this crate, so the two sides cannot
//! drift apart.

pub mod callbacks;
pub mod environment;
pub mod types;

pub use callbacks::{
    AudioSampleBatchFn, AudioSampleFn, EnvironmentFn, InputPollFn, InputStateFn, VideoRefreshFn,
    HW_FRAME_BUFFER_VALID,
};
pub use environment::{
    HwContextResetFn, HwGetCurrentFramebufferFn, HwGetProcAddressFn, HwRenderCallback,
    LogCallback, LogPrintfFn, Message, Variable, ENV_GET_CAN_DUPE,
    ENV_GET_CORE_ASSETS_DIRECTORY, ENV_GET_LANGUAGE, ENV_GET_LOG_INTERFACE, ENV_GET_OVERSCAN,
    ENV_GET_SAVE_DIRECTORY, ENV_GET_SYSTEM_DIRECTORY, ENV_GET_USERNAME, ENV_GET_VARIABLE,
    ENV_GET_VARIABLE_UPDATE, ENV_SET_GEOMETRY, ENV_SET_HW_RENDER, ENV_SET_INPUT_DESCRIPTORS,
    ENV_SET_MESSAGE, ENV_SET_PERFORMANCE_LEVEL, ENV_SET_PIXEL_FORMAT, ENV_SET_ROTATION,
    ENV_SET_SUPPORT_NO_GAME, ENV_SET_SYSTEM_AV_INFO, ENV_SET_VARIABLES, ENV_SHUTDOWN,
    HW_CONTEXT_NONE, HW_CONTEXT_OPENGL, HW_CONTEXT_OPENGLES2, HW_CONTEXT_OPENGLES3,
    HW_CONTEXT_OPENGL_CORE,
};
pub use types::{
    GameGeometry, GameInfo, JoypadButton, LogLevel, PixelFormat, SystemAvInfo, SystemInfo,
    SystemTiming, API_VERSION, DEVICE_ANALOG, DEVICE_JOYPAD, DEVICE_NONE, LANGUAGE_ENGLISH,
};
