// crates/sample_core/src/lib.rs
//! A minimal core exercising the host end to end: XRGB8888 test pattern,
//! square-wave audio, one config variable, one button. Build as a cdylib and
//! point the frontend at the resulting shared library.

use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use retro_abi::{
    AudioSampleBatchFn, AudioSampleFn, EnvironmentFn, GameInfo, InputPollFn, InputStateFn,
    JoypadButton, PixelFormat, SystemAvInfo, SystemInfo, Variable, VideoRefreshFn, API_VERSION,
    DEVICE_JOYPAD, ENV_GET_LOG_INTERFACE, ENV_GET_SAVE_DIRECTORY, ENV_GET_VARIABLE,
    ENV_SET_PIXEL_FORMAT, ENV_SET_VARIABLES, LogCallback,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FPS: f64 = 60.0;
const SAMPLE_RATE: f64 = 44100.0;
const FRAMES_PER_TICK: usize = (44100 / 60) as usize;
const TONE_HZ: u32 = 440;

#[derive(Default, Clone, Copy)]
struct Callbacks {
    env: Option<EnvironmentFn>,
    video: Option<VideoRefreshFn>,
    audio_batch: Option<AudioSampleBatchFn>,
    input_poll: Option<InputPollFn>,
    input_state: Option<InputStateFn>,
    log: Option<retro_abi::LogPrintfFn>,
}

static CALLBACKS: Mutex<Callbacks> = Mutex::new(Callbacks {
    env: None,
    video: None,
    audio_batch: None,
    input_poll: None,
    input_state: None,
    log: None,
});

static FRAME: AtomicU64 = AtomicU64::new(0);
static TONE_PHASE: AtomicU32 = AtomicU32::new(0);
static INVERTED: AtomicBool = AtomicBool::new(false);
static GAME_LOADED: AtomicBool = AtomicBool::new(false);

fn callbacks() -> Callbacks {
    *CALLBACKS.lock().unwrap_or_else(|e| e.into_inner())
}

fn log_line(text: &str) {
    if let Some(log) = callbacks().log {
        if let Ok(c) = CString::new(text) {
            // No variadic arguments; the host logs the string verbatim.
            unsafe { log(1, c.as_ptr()) };
        }
    }
}

#[no_mangle]
pub extern "C" fn retro_api_version() -> u32 {
    API_VERSION
}

#[no_mangle]
pub extern "C" fn retro_init() {
    FRAME.store(0, Ordering::Relaxed);
    TONE_PHASE.store(0, Ordering::Relaxed);
}

#[no_mangle]
pub extern "C" fn retro_deinit() {
    GAME_LOADED.store(false, Ordering::Relaxed);
    *CALLBACKS.lock().unwrap_or_else(|e| e.into_inner()) = Callbacks::default();
}

/// # Safety
/// `info` must point to a writable `SystemInfo`.
#[no_mangle]
pub unsafe extern "C" fn retro_get_system_info(info: *mut SystemInfo) {
    if info.is_null() {
        return;
    }
    let info = unsafe { &mut *info };
    info.library_name = b"Sample Core\0".as_ptr() as *const c_char;
    info.library_version = b"0.1.0\0".as_ptr() as *const c_char;
    info.valid_extensions = b"bin\0".as_ptr() as *const c_char;
    info.need_fullpath = false;
    info.block_extract = false;
}

/// # Safety
/// `av` must point to a writable `SystemAvInfo`. Only valid after a
/// successful `retro_load_game`.
#[no_mangle]
pub unsafe extern "C" fn retro_get_system_av_info(av: *mut SystemAvInfo) {
    if av.is_null() {
        return;
    }
    let av = unsafe { &mut *av };
    av.geometry.base_width = WIDTH;
    av.geometry.base_height = HEIGHT;
    av.geometry.max_width = WIDTH;
    av.geometry.max_height = HEIGHT;
    av.geometry.aspect_ratio = WIDTH as f32 / HEIGHT as f32;
    av.timing.fps = FPS;
    av.timing.sample_rate = SAMPLE_RATE;
}

#[no_mangle]
pub extern "C" fn retro_set_environment(cb: EnvironmentFn) {
    CALLBACKS.lock().unwrap_or_else(|e| e.into_inner()).env = Some(cb);

    // Announce the config variables up front, as the convention expects.
    let vars = [
        Variable {
            key: b"sample_pattern\0".as_ptr() as *const c_char,
            value: b"Test pattern; gradient|bars\0".as_ptr() as *const c_char,
        },
        Variable {
            key: std::ptr::null(),
            value: std::ptr::null(),
        },
    ];
    cb(ENV_SET_VARIABLES, vars.as_ptr() as *mut c_void);

    let mut log_cb = LogCallback { log: None };
    if cb(
        ENV_GET_LOG_INTERFACE,
        &mut log_cb as *mut LogCallback as *mut c_void,
    ) {
        CALLBACKS.lock().unwrap_or_else(|e| e.into_inner()).log = log_cb.log;
    }
}

#[no_mangle]
pub extern "C" fn retro_set_video_refresh(cb: VideoRefreshFn) {
    CALLBACKS.lock().unwrap_or_else(|e| e.into_inner()).video = Some(cb);
}

#[no_mangle]
pub extern "C" fn retro_set_audio_sample(_cb: AudioSampleFn) {}

#[no_mangle]
pub extern "C" fn retro_set_audio_sample_batch(cb: AudioSampleBatchFn) {
    CALLBACKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .audio_batch = Some(cb);
}

#[no_mangle]
pub extern "C" fn retro_set_input_poll(cb: InputPollFn) {
    CALLBACKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .input_poll = Some(cb);
}

#[no_mangle]
pub extern "C" fn retro_set_input_state(cb: InputStateFn) {
    CALLBACKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .input_state = Some(cb);
}

/// # Safety
/// `info`, when non-null, must point to a valid `GameInfo` for the duration
/// of the call.
#[no_mangle]
pub unsafe extern "C" fn retro_load_game(info: *const GameInfo) -> bool {
    if info.is_null() {
        return false;
    }
    let info = unsafe { &*info };
    // This core renders its own content; any non-empty payload or path is
    // accepted, an empty one is refused.
    if info.data.is_null() && info.path.is_null() {
        return false;
    }

    let Some(env) = callbacks().env else {
        return false;
    };

    // The pattern only renders 32-bit pixels; refuse to start without them.
    let mut fmt = PixelFormat::Xrgb8888 as u32;
    if !env(ENV_SET_PIXEL_FORMAT, &mut fmt as *mut u32 as *mut c_void) {
        log_line("host declined XRGB8888, cannot continue");
        return false;
    }

    let mut save_dir: *const c_char = std::ptr::null();
    if env(
        ENV_GET_SAVE_DIRECTORY,
        &mut save_dir as *mut *const c_char as *mut c_void,
    ) && !save_dir.is_null()
    {
        log_line("save directory available");
    }

    let mut var = Variable {
        key: b"sample_pattern\0".as_ptr() as *const c_char,
        value: std::ptr::null(),
    };
    if env(ENV_GET_VARIABLE, &mut var as *mut Variable as *mut c_void) && !var.value.is_null() {
        let value = unsafe { CStr::from_ptr(var.value) }.to_string_lossy();
        INVERTED.store(value.as_ref() == "bars", Ordering::Relaxed);
    }

    GAME_LOADED.store(true, Ordering::Relaxed);
    log_line("sample core content loaded");
    true
}

#[no_mangle]
pub extern "C" fn retro_unload_game() {
    GAME_LOADED.store(false, Ordering::Relaxed);
}

#[no_mangle]
pub extern "C" fn retro_run() {
    let cbs = callbacks();
    let (Some(video), Some(audio_batch), Some(input_poll), Some(input_state)) =
        (cbs.video, cbs.audio_batch, cbs.input_poll, cbs.input_state)
    else {
        return;
    };
    if !GAME_LOADED.load(Ordering::Relaxed) {
        return;
    }

    input_poll();
    let b_pressed = input_state(0, DEVICE_JOYPAD, 0, JoypadButton::B as u32) != 0;

    let frame = FRAME.fetch_add(1, Ordering::Relaxed);
    let shift = (frame % 256) as u32;
    let mut pixels = vec![0u32; (WIDTH * HEIGHT) as usize];
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let r = (x + shift) & 0xFF;
            let g = (y + shift) & 0xFF;
            let b = if b_pressed { 0xFF } else { shift };
            let mut px = (r << 16) | (g << 8) | b;
            if INVERTED.load(Ordering::Relaxed) {
                px = !px & 0x00FF_FFFF;
            }
            pixels[(y * WIDTH + x) as usize] = px;
        }
    }
    video(
        pixels.as_ptr() as *const c_void,
        WIDTH,
        HEIGHT,
        WIDTH as usize * 4,
    );

    // 440 Hz square wave, one video frame's worth of samples.
    let period = (SAMPLE_RATE as u32 / TONE_HZ).max(2);
    let mut samples = [0i16; FRAMES_PER_TICK * 2];
    for i in 0..FRAMES_PER_TICK {
        let phase = TONE_PHASE.fetch_add(1, Ordering::Relaxed);
        let level = if (phase / (period / 2)) % 2 == 0 {
            6000
        } else {
            -6000
        };
        samples[i * 2] = level;
        samples[i * 2 + 1] = level;
    }
    audio_batch(samples.as_ptr(), FRAMES_PER_TICK);
}

#[no_mangle]
pub extern "C" fn retro_reset() {
    FRAME.store(0, Ordering::Relaxed);
    TONE_PHASE.store(0, Ordering::Relaxed);
}

#[no_mangle]
pub extern "C" fn retro_set_controller_port_device(_port: u32, _device: u32) {}
