// crates/retro_host/src/input.rs
//! Host-side input state shared between the embedder's controller events and
//! the core's input-state queries.

use std::sync::Mutex;

use tracing::trace;

use retro_abi::{JoypadButton, DEVICE_ANALOG, DEVICE_JOYPAD};

/// Controller ports the bridge tracks.
pub const MAX_PORTS: usize = 4;

/// Analog magnitudes below this are treated as released, at or above as
/// pressed. Axes are quantized to booleans by policy: the query signature
/// allows 16-bit magnitudes, but this host reports only 0 or 1. This is a
/// documented limitation carried over from the system being bridged.
pub const AXIS_DEADZONE: f32 = 0.25;

/// Stick axes the embedder can feed in; quantized onto the d-pad buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogAxis {
    /// Negative = left, positive = right.
    LeftX,
    /// Negative = down, positive = up.
    LeftY,
}

/// One port's digital button state as a bitmask over [`JoypadButton`] ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PadState {
    buttons: u16,
}

impl PadState {
    pub fn set(&mut self, button: JoypadButton, pressed: bool) {
        let bit = 1u16 << (button as u32);
        if pressed {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
    }

    pub fn pressed(&self, button: JoypadButton) -> bool {
        self.buttons & (1u16 << (button as u32)) != 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Pads {
    ports: [PadState; MAX_PORTS],
}

/// The only bridge state mutated from outside the frame-pump thread.
///
/// Controller events write `live` at any time; at the start of every run
/// call the pump copies `live` into `snapshot`, and the core's input-state
/// queries read `snapshot` exclusively. A query therefore sees either the
/// pre-frame state or a fully-applied update, never a partial write.
#[derive(Default)]
pub struct InputBridge {
    live: Mutex<Pads>,
    snapshot: Mutex<Pads>,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digital button event from the embedder's controller listener.
    pub fn set_button(&self, port: usize, button: JoypadButton, pressed: bool) {
        if port >= MAX_PORTS {
            return;
        }
        lock(&self.live).ports[port].set(button, pressed);
    }

    /// Analog stick event; quantized through [`AXIS_DEADZONE`] onto the
    /// directional buttons, discarding magnitude.
    pub fn set_axis(&self, port: usize, axis: AnalogAxis, value: f32) {
        if port >= MAX_PORTS {
            return;
        }
        let (negative, positive) = match axis {
            AnalogAxis::LeftX => (JoypadButton::Left, JoypadButton::Right),
            AnalogAxis::LeftY => (JoypadButton::Down, JoypadButton::Up),
        };
        let mut live = lock(&self.live);
        let pad = &mut live.ports[port];
        pad.set(negative, value <= -AXIS_DEADZONE);
        pad.set(positive, value >= AXIS_DEADZONE);
    }

    /// Current live state of one button (for the embedder; the core reads
    /// the snapshot instead).
    pub fn is_pressed(&self, port: usize, button: JoypadButton) -> bool {
        if port >= MAX_PORTS {
            return false;
        }
        lock(&self.live).ports[port].pressed(button)
    }

    /// Copy the live state into the per-frame snapshot. Called once at the
    /// start of every run call, on the frame-pump thread.
    pub(crate) fn begin_frame(&self) {
        let live = *lock(&self.live);
        *lock(&self.snapshot) = live;
    }

    /// The input-state query callback. Purely boolean joypad policy; analog
    /// device queries answer from the same quantized state.
    pub(crate) fn query(&self, port: u32, device: u32, _index: u32, id: u32) -> i16 {
        if device != DEVICE_JOYPAD && device != DEVICE_ANALOG {
            trace!(port, device, "unsupported device class queried");
            return 0;
        }
        let (Ok(port), Some(button)) = (usize::try_from(port), JoypadButton::from_raw(id)) else {
            return 0;
        };
        if port >= MAX_PORTS {
            return 0;
        }
        if lock(&self.snapshot).ports[port].pressed(button) {
            1
        } else {
            0
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn query_reads_the_snapshot_not_live_state() {
        let bridge = InputBridge::new();
        bridge.set_button(0, JoypadButton::A, true);
        bridge.begin_frame();

        // Mid-frame mutation must not leak into this frame's queries.
        bridge.set_button(0, JoypadButton::A, false);
        bridge.set_button(0, JoypadButton::Start, true);

        assert_eq!(bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::A as u32), 1);
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Start as u32),
            0
        );

        // Next frame observes the fully-applied update.
        bridge.begin_frame();
        assert_eq!(bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::A as u32), 0);
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Start as u32),
            1
        );
    }

    #[test]
    fn axis_quantizes_through_the_deadzone() {
        let bridge = InputBridge::new();

        bridge.set_axis(0, AnalogAxis::LeftX, 0.1);
        bridge.begin_frame();
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Right as u32),
            0
        );

        bridge.set_axis(0, AnalogAxis::LeftX, 0.9);
        bridge.begin_frame();
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Right as u32),
            1
        );
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Left as u32),
            0
        );

        bridge.set_axis(0, AnalogAxis::LeftX, -1.0);
        bridge.begin_frame();
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Left as u32),
            1
        );
        assert_eq!(
            bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Right as u32),
            0
        );
    }

    #[test]
    fn out_of_range_ports_and_ids_answer_zero() {
        let bridge = InputBridge::new();
        bridge.set_button(99, JoypadButton::A, true); // silently ignored
        bridge.begin_frame();
        assert_eq!(bridge.query(99, DEVICE_JOYPAD, 0, 0), 0);
        assert_eq!(bridge.query(0, DEVICE_JOYPAD, 0, 42), 0);
        assert_eq!(bridge.query(0, 3, 0, 0), 0); // keyboard class unsupported
    }

    #[test]
    fn concurrent_writes_never_tear_a_snapshot() {
        let bridge = Arc::new(InputBridge::new());
        let writer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                for i in 0..2000 {
                    // One set_axis call updates Left and Right under a single
                    // lock, so no snapshot may ever show both pressed.
                    let value = if i % 2 == 0 { 1.0 } else { -1.0 };
                    bridge.set_axis(0, AnalogAxis::LeftX, value);
                }
            })
        };

        for _ in 0..500 {
            bridge.begin_frame();
            let left = bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Left as u32);
            let right = bridge.query(0, DEVICE_JOYPAD, 0, JoypadButton::Right as u32);
            assert!(
                !(left == 1 && right == 1),
                "torn snapshot: both directions pressed"
            );
        }
        writer.join().unwrap();
    }
}
