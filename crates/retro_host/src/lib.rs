// crates/retro_host/src/lib.rs
//! Host for dynamically loaded emulation cores speaking a C callback ABI.
//!
//! The embedder loads a core into a [`session::Session`], feeds it content
//! and controller state, paces [`session::Session::run_frame`] with a
//! [`pump::FramePacer`], and drains video frames and audio batches from the
//! session's channels. At most one session is live per process; the core's
//! callbacks carry no context pointer, so they route through a single global
//! bridge slot.

// Embedders need the ABI types (buttons, pixel formats, AV info) alongside
// the host API.
pub use retro_abi;

pub mod audio;
pub mod config;
pub mod error;
pub mod hw_render;
pub mod input;
pub mod loader;
pub mod pump;
pub mod session;
pub mod video;

mod bridge;
mod dirs;
mod environment;
mod variables;

pub use audio::AudioBatch;
pub use config::HostConfig;
pub use error::HostError;
pub use hw_render::{HwContextRequest, HwRenderDelegate};
pub use input::{AnalogAxis, InputBridge, AXIS_DEADZONE, MAX_PORTS};
pub use loader::{CoreIdentity, CoreLibrary, EntryPoints};
pub use pump::{FramePacer, TickOutcome};
pub use session::{Session, SessionState};
pub use video::{FrameBuffer, FrameEvent};
