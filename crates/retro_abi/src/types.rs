// crates/retro_abi/src/types.rs
//! Core data types of the foreign ABI. Bit widths matter: the loaded library
//! was compiled against the C header, not against this crate.

use core::ffi::{c_char, c_void};

/// The only ABI revision this host speaks. `retro_api_version` must return it.
pub const API_VERSION: u32 = 1;

/// Input device classes passed to the input-state query.
pub const DEVICE_NONE: u32 = 0;
pub const DEVICE_JOYPAD: u32 = 1;
pub const DEVICE_MOUSE: u32 = 2;
pub const DEVICE_KEYBOARD: u32 = 3;
pub const DEVICE_LIGHTGUN: u32 = 4;
pub const DEVICE_ANALOG: u32 = 5;
pub const DEVICE_POINTER: u32 = 6;

/// Language code returned for the language query. This host is English-only.
pub const LANGUAGE_ENGLISH: u32 = 0;

/// Framebuffer pixel formats a core may negotiate.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 0RGB1555, native endian.
    Rgb1555 = 0,
    /// XRGB8888, native endian.
    Xrgb8888 = 1,
    /// RGB565, native endian.
    Rgb565 = 2,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Rgb1555),
            1 => Some(Self::Xrgb8888),
            2 => Some(Self::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Xrgb8888 => 4,
            Self::Rgb1555 | Self::Rgb565 => 2,
        }
    }
}

/// Joypad button ids, the `id` argument of the input-state query for
/// `DEVICE_JOYPAD`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoypadButton {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L = 10,
    R = 11,
    L2 = 12,
    R2 = 13,
    L3 = 14,
    R3 = 15,
}

impl JoypadButton {
    pub const COUNT: usize = 16;

    pub fn from_raw(raw: u32) -> Option<Self> {
        use JoypadButton::*;
        const ALL: [JoypadButton; JoypadButton::COUNT] = [
            B, Y, Select, Start, Up, Down, Left, Right, A, X, L, R, L2, R2, L3, R3,
        ];
        ALL.get(raw as usize).copied()
    }
}

/// Severity levels of the core-side log callback.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warn,
            _ => Self::Error,
        }
    }
}

/// Resolution info filled in by `retro_get_system_av_info`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GameGeometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
}

/// Timing info filled in by `retro_get_system_av_info`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SystemTiming {
    pub fps: f64,
    pub sample_rate: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SystemAvInfo {
    pub geometry: GameGeometry,
    pub timing: SystemTiming,
}

impl Default for SystemAvInfo {
    fn default() -> Self {
        Self {
            geometry: GameGeometry {
                base_width: 0,
                base_height: 0,
                max_width: 0,
                max_height: 0,
                aspect_ratio: 0.0,
            },
            timing: SystemTiming {
                fps: 0.0,
                sample_rate: 0.0,
            },
        }
    }
}

/// Static identity of the core, filled in by `retro_get_system_info`.
/// The strings point into the loaded library and stay valid while it is open.
#[repr(C)]
pub struct SystemInfo {
    pub library_name: *const c_char,
    pub library_version: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl SystemInfo {
    pub fn zeroed() -> Self {
        Self {
            library_name: core::ptr::null(),
            library_version: core::ptr::null(),
            valid_extensions: core::ptr::null(),
            need_fullpath: false,
            block_extract: false,
        }
    }
}

/// Argument of `retro_load_game`. `data`/`size` may describe the content
/// bytes, or be null/zero when the core wants a path only (`need_fullpath`).
#[repr(C)]
pub struct GameInfo {
    pub path: *const c_char,
    pub data: *const c_void,
    pub size: usize,
    pub meta: *const c_char,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_round_trip() {
        for raw in 0..3 {
            let fmt = PixelFormat::from_raw(raw).unwrap();
            assert_eq!(fmt as u32, raw);
        }
        assert_eq!(PixelFormat::from_raw(3), None);
    }

    #[test]
    fn pixel_format_sizes() {
        assert_eq!(PixelFormat::Xrgb8888.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgb565.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb1555.bytes_per_pixel(), 2);
    }

    #[test]
    fn joypad_button_ids_are_dense() {
        for id in 0..JoypadButton::COUNT as u32 {
            assert_eq!(JoypadButton::from_raw(id).unwrap() as u32, id);
        }
        assert_eq!(JoypadButton::from_raw(16), None);
    }

    #[test]
    fn game_info_layout_matches_c() {
        // Four pointer-sized fields in the C struct.
        assert_eq!(
            core::mem::size_of::<GameInfo>(),
            4 * core::mem::size_of::<usize>()
        );
    }
}
