// crates/retro_host/src/hw_render.rs
//! Hardware-render negotiation: cores that draw with a GPU context instead
//! of software framebuffers register reset/destroy hooks and receive
//! framebuffer and proc-address getters from the host's render delegate.

use std::ffi::{c_char, c_void};
use std::sync::Mutex;

use tracing::{debug, warn};

use retro_abi::{
    HwContextResetFn, HwRenderCallback, HW_CONTEXT_OPENGL, HW_CONTEXT_OPENGLES2,
    HW_CONTEXT_OPENGLES3, HW_CONTEXT_OPENGL_CORE,
};

/// The GPU context a core asked for, decoded from the raw context type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwContextRequest {
    pub context_type: u32,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub version_major: u32,
    pub version_minor: u32,
}

/// Embedder-provided GPU plumbing. The bridge owns no graphics API; it only
/// relays the core's request to whoever does.
pub trait HwRenderDelegate: Send + Sync {
    /// Decide whether the requested context can be provided. Returning false
    /// declines the negotiation and the core must fall back to software.
    fn prepare(&self, request: &HwContextRequest) -> bool;

    /// Handle of the framebuffer the core should render into this frame.
    fn current_framebuffer(&self) -> usize;

    /// Address of a graphics-API symbol, or null.
    fn proc_address(&self, symbol: &str) -> *const c_void;

    /// The session is tearing down; release context resources.
    fn release(&self);
}

#[derive(Default)]
struct Hooks {
    context_reset: Option<HwContextResetFn>,
    context_destroy: Option<HwContextResetFn>,
}

/// Host side of SET_HW_RENDER.
pub(crate) struct HwBridge {
    delegate: Mutex<Option<Box<dyn HwRenderDelegate>>>,
    hooks: Mutex<Hooks>,
}

impl HwBridge {
    pub(crate) fn new() -> Self {
        Self {
            delegate: Mutex::new(None),
            hooks: Mutex::new(Hooks::default()),
        }
    }

    pub(crate) fn set_delegate(&self, delegate: Box<dyn HwRenderDelegate>) {
        *lock(&self.delegate) = Some(delegate);
    }

    /// SET_HW_RENDER handler. On acceptance the payload's getter fields are
    /// filled in for the core and the reset/destroy hooks are remembered.
    /// Without a delegate every request is declined.
    ///
    /// # Safety
    ///
    /// `cb` must point to a valid `HwRenderCallback` owned by the core for
    /// the duration of the call.
    pub(crate) unsafe fn negotiate(&self, cb: *mut HwRenderCallback) -> bool {
        if cb.is_null() {
            return false;
        }
        let payload = unsafe { &mut *cb };

        if !matches!(
            payload.context_type,
            HW_CONTEXT_OPENGL | HW_CONTEXT_OPENGLES2 | HW_CONTEXT_OPENGL_CORE | HW_CONTEXT_OPENGLES3
        ) {
            warn!(context_type = payload.context_type, "unsupported GPU context requested");
            return false;
        }

        let request = HwContextRequest {
            context_type: payload.context_type,
            depth: payload.depth,
            stencil: payload.stencil,
            bottom_left_origin: payload.bottom_left_origin,
            version_major: payload.version_major,
            version_minor: payload.version_minor,
        };

        let delegate = lock(&self.delegate);
        let Some(delegate) = delegate.as_ref() else {
            debug!("hardware render requested but no delegate installed, declining");
            return false;
        };
        if !delegate.prepare(&request) {
            debug!(?request, "render delegate declined GPU context");
            return false;
        }

        let mut hooks = lock(&self.hooks);
        hooks.context_reset = payload.context_reset;
        hooks.context_destroy = payload.context_destroy;

        payload.get_current_framebuffer = Some(hw_get_current_framebuffer);
        payload.get_proc_address = Some(hw_get_proc_address);

        debug!(?request, "GPU context negotiated");
        true
    }

    /// Invoke the core's context_reset hook. Must happen after the delegate
    /// has a live context and before the first run call that renders.
    /// The pointer is copied out first; the hook runs with no lock held, so
    /// it may re-enter the negotiation path.
    pub(crate) fn fire_context_reset(&self) {
        let reset = lock(&self.hooks).context_reset;
        if let Some(reset) = reset {
            // SAFETY: registered by the core during SET_HW_RENDER and valid
            // while the library stays loaded.
            unsafe { reset() };
        }
    }

    /// Teardown: fire context_destroy, then release the delegate's
    /// resources, in that order, so the core never observes a dead context.
    pub(crate) fn release(&self) {
        let destroy = lock(&self.hooks).context_destroy.take();
        if let Some(destroy) = destroy {
            // SAFETY: same contract as context_reset.
            unsafe { destroy() };
        }
        lock(&self.hooks).context_reset = None;
        if let Some(delegate) = lock(&self.delegate).take() {
            delegate.release();
        }
    }

    pub(crate) fn current_framebuffer(&self) -> usize {
        lock(&self.delegate)
            .as_ref()
            .map(|d| d.current_framebuffer())
            .unwrap_or(0)
    }

    pub(crate) fn proc_address(&self, symbol: &str) -> *const c_void {
        lock(&self.delegate)
            .as_ref()
            .map(|d| d.proc_address(symbol))
            .unwrap_or(std::ptr::null())
    }
}

// The getters handed to the core route through the globally installed
// bridge; a core calling them after teardown gets harmless defaults.

pub(crate) extern "C" fn hw_get_current_framebuffer() -> usize {
    crate::bridge::with_bridge(|b| b.hw.current_framebuffer()).unwrap_or(0)
}

pub(crate) extern "C" fn hw_get_proc_address(symbol: *const c_char) -> *const c_void {
    if symbol.is_null() {
        return std::ptr::null();
    }
    // SAFETY: the core passes a NUL-terminated symbol name.
    let name = match unsafe { std::ffi::CStr::from_ptr(symbol) }.to_str() {
        Ok(s) => s,
        Err(_) => return std::ptr::null(),
    };
    crate::bridge::with_bridge(|b| b.hw.proc_address(name)).unwrap_or(std::ptr::null())
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
