// crates/retro_host/src/video.rs
//! Video-refresh handling: classify the foreign buffer pointer, copy pixels
//! out while they are still valid, and publish frames to the embedder.

use std::ffi::c_void;
use std::sync::Mutex;

use crossbeam_channel::{Sender, TrySendError};
use tracing::{trace, warn};

use retro_abi::{GameGeometry, PixelFormat, SystemAvInfo, HW_FRAME_BUFFER_VALID};

/// Upper bound for either frame dimension; anything larger is treated as a
/// malformed callback and dropped.
const MAX_DIMENSION: u32 = 4096;

/// How the core delivered this frame. Explicit enum instead of magic pointer
/// values: null means "duplicate of the previous frame", the reserved
/// sentinel means "already rendered into the host's framebuffer".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Duplicate,
    HardwareRendered,
    Software,
}

pub(crate) fn classify(data: *const c_void) -> Delivery {
    if data.is_null() {
        Delivery::Duplicate
    } else if data == HW_FRAME_BUFFER_VALID {
        Delivery::HardwareRendered
    } else {
        Delivery::Software
    }
}

/// A tightly packed copy of one video frame, safe to hold after the
/// callback that delivered it has returned.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// `height` rows of `width` pixels, no padding between rows.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameBuffer {
    /// Copy a foreign pixel buffer row by row, dropping the pitch padding.
    /// `src` must cover `pitch * height` bytes; the caller builds the slice
    /// inside the callback, while the foreign buffer is still valid.
    pub(crate) fn copy_from_foreign(
        src: &[u8],
        width: u32,
        height: u32,
        pitch: usize,
        format: PixelFormat,
    ) -> Self {
        let row_bytes = width as usize * format.bytes_per_pixel();
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * pitch;
            data.extend_from_slice(&src[start..start + row_bytes]);
        }
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Convert to RGBA8888 for presentation, whatever the negotiated format.
    pub fn to_rgba8888(&self) -> Vec<u8> {
        let pixels = self.width as usize * self.height as usize;
        let mut out = Vec::with_capacity(pixels * 4);
        match self.format {
            PixelFormat::Xrgb8888 => {
                for px in self.data.chunks_exact(4) {
                    let v = u32::from_ne_bytes([px[0], px[1], px[2], px[3]]);
                    out.push(((v >> 16) & 0xFF) as u8);
                    out.push(((v >> 8) & 0xFF) as u8);
                    out.push((v & 0xFF) as u8);
                    out.push(255);
                }
            }
            PixelFormat::Rgb565 => {
                for px in self.data.chunks_exact(2) {
                    let v = u16::from_ne_bytes([px[0], px[1]]);
                    out.push(((v >> 11) as u8) << 3);
                    out.push((((v >> 5) & 0x3F) as u8) << 2);
                    out.push(((v & 0x1F) as u8) << 3);
                    out.push(255);
                }
            }
            PixelFormat::Rgb1555 => {
                for px in self.data.chunks_exact(2) {
                    let v = u16::from_ne_bytes([px[0], px[1]]);
                    out.push((((v >> 10) & 0x1F) as u8) << 3);
                    out.push((((v >> 5) & 0x1F) as u8) << 3);
                    out.push(((v & 0x1F) as u8) << 3);
                    out.push(255);
                }
            }
        }
        out
    }
}

/// "New frame available" notification delivered to the embedder.
#[derive(Debug, Clone)]
pub enum FrameEvent {
    /// Software path: the pixels were copied out during the callback.
    Frame(FrameBuffer),
    /// Hardware path: the frame is already in the framebuffer owned by the
    /// host's render delegate; present it from there.
    HardwareRendered { width: u32, height: u32 },
}

/// Host side of the video-refresh callback.
pub(crate) struct VideoBridge {
    /// Negotiated pixel format. The foreign default is RGB1555 until the
    /// core successfully negotiates something else.
    format: Mutex<PixelFormat>,
    /// Geometry/timing, set at game load and updated by SET_SYSTEM_AV_INFO
    /// and SET_GEOMETRY.
    av: Mutex<Option<SystemAvInfo>>,
    frames: Sender<FrameEvent>,
}

impl VideoBridge {
    pub(crate) fn new(frames: Sender<FrameEvent>) -> Self {
        Self {
            format: Mutex::new(PixelFormat::Rgb1555),
            av: Mutex::new(None),
            frames,
        }
    }

    pub(crate) fn pixel_format(&self) -> PixelFormat {
        *lock(&self.format)
    }

    /// Pixel-format negotiation: this host supports exactly XRGB8888. On
    /// decline the stored format is left unchanged.
    pub(crate) fn negotiate_format(&self, proposed: PixelFormat) -> bool {
        match proposed {
            PixelFormat::Xrgb8888 => {
                *lock(&self.format) = proposed;
                true
            }
            other => {
                trace!(?other, "declining unsupported pixel format");
                false
            }
        }
    }

    pub(crate) fn set_av_info(&self, av: SystemAvInfo) {
        *lock(&self.av) = Some(av);
    }

    pub(crate) fn set_geometry(&self, geometry: GameGeometry) {
        if let Some(av) = lock(&self.av).as_mut() {
            av.geometry = geometry;
        }
    }

    pub(crate) fn av_info(&self) -> Option<SystemAvInfo> {
        *lock(&self.av)
    }

    /// The video-refresh callback body. The foreign buffer is only valid for
    /// the duration of this call, so software frames are copied here and
    /// never referenced afterwards.
    pub(crate) fn on_refresh(&self, data: *const c_void, width: u32, height: u32, pitch: usize) {
        match classify(data) {
            Delivery::Duplicate => {
                trace!("duplicate frame, skipping");
            }
            Delivery::HardwareRendered => {
                self.publish(FrameEvent::HardwareRendered { width, height });
            }
            Delivery::Software => {
                if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
                    warn!(width, height, "malformed video refresh, dropping frame");
                    return;
                }
                let format = self.pixel_format();
                if pitch < width as usize * format.bytes_per_pixel() {
                    warn!(pitch, width, "pitch smaller than a row, dropping frame");
                    return;
                }
                // SAFETY: non-null, non-sentinel pointer from the core's
                // video-refresh callback; the ABI guarantees it covers
                // pitch * height bytes for the duration of the callback.
                let src =
                    unsafe { std::slice::from_raw_parts(data as *const u8, pitch * height as usize) };
                let frame = FrameBuffer::copy_from_foreign(src, width, height, pitch, format);
                self.publish(FrameEvent::Frame(frame));
            }
        }
    }

    fn publish(&self, event: FrameEvent) {
        match self.frames.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("frame channel full, dropping frame"),
            Err(TrySendError::Disconnected(_)) => trace!("frame receiver gone"),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn classify_recognizes_the_sentinel_and_null() {
        assert_eq!(classify(std::ptr::null()), Delivery::Duplicate);
        assert_eq!(classify(HW_FRAME_BUFFER_VALID), Delivery::HardwareRendered);
        let buf = [0u8; 4];
        assert_eq!(
            classify(buf.as_ptr() as *const c_void),
            Delivery::Software
        );
    }

    #[test]
    fn copy_drops_pitch_padding() {
        // 2x2 XRGB8888 frame with 4 bytes of padding per row.
        let width = 2u32;
        let height = 2u32;
        let pitch = 12usize;
        let mut src = vec![0u8; pitch * height as usize];
        for row in 0..2 {
            for col in 0..2 {
                let px = row * pitch + col * 4;
                src[px..px + 4].copy_from_slice(&[(row as u8) * 16 + col as u8; 4]);
            }
        }
        let frame =
            FrameBuffer::copy_from_foreign(&src, width, height, pitch, PixelFormat::Xrgb8888);
        assert_eq!(frame.data.len(), 2 * 2 * 4);
        assert_eq!(&frame.data[0..4], &[0; 4]);
        assert_eq!(&frame.data[4..8], &[1; 4]);
        assert_eq!(&frame.data[8..12], &[16; 4]);
        assert_eq!(&frame.data[12..16], &[17; 4]);
    }

    #[test]
    fn copied_frame_outlives_the_source_buffer() {
        let frame = {
            let src = vec![0xABu8; 4 * 4];
            FrameBuffer::copy_from_foreign(&src, 2, 2, 8, PixelFormat::Xrgb8888)
        };
        // Source dropped; the copy must still hold the pixels.
        assert!(frame.data.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn negotiation_accepts_only_xrgb8888() {
        let (tx, _rx) = bounded(1);
        let video = VideoBridge::new(tx);
        assert_eq!(video.pixel_format(), PixelFormat::Rgb1555);

        assert!(video.negotiate_format(PixelFormat::Xrgb8888));
        assert_eq!(video.pixel_format(), PixelFormat::Xrgb8888);

        // Declined proposal leaves the current format unchanged.
        assert!(!video.negotiate_format(PixelFormat::Rgb565));
        assert_eq!(video.pixel_format(), PixelFormat::Xrgb8888);
    }

    #[test]
    fn rgba_conversion_per_format() {
        // XRGB8888: 0x00112233 -> R=0x11 G=0x22 B=0x33.
        let frame = FrameBuffer {
            data: 0x0011_2233u32.to_ne_bytes().to_vec(),
            width: 1,
            height: 1,
            format: PixelFormat::Xrgb8888,
        };
        assert_eq!(frame.to_rgba8888(), vec![0x11, 0x22, 0x33, 255]);

        // RGB565: all-ones red channel.
        let frame = FrameBuffer {
            data: 0xF800u16.to_ne_bytes().to_vec(),
            width: 1,
            height: 1,
            format: PixelFormat::Rgb565,
        };
        assert_eq!(frame.to_rgba8888(), vec![0xF8, 0, 0, 255]);

        // 0RGB1555: all-ones blue channel.
        let frame = FrameBuffer {
            data: 0x001Fu16.to_ne_bytes().to_vec(),
            width: 1,
            height: 1,
            format: PixelFormat::Rgb1555,
        };
        assert_eq!(frame.to_rgba8888(), vec![0, 0, 0xF8, 255]);
    }

    #[test]
    fn full_channel_drops_frames_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        let video = VideoBridge::new(tx);
        video.negotiate_format(PixelFormat::Xrgb8888);

        let px = [0u8; 4];
        video.on_refresh(px.as_ptr() as *const c_void, 1, 1, 4);
        video.on_refresh(px.as_ptr() as *const c_void, 1, 1, 4); // dropped

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
