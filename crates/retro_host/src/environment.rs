// crates/retro_host/src/environment.rs
//! The environment command dispatcher: a foreign-defined tagged union where
//! the command code implies the payload type. Unknown commands are declined,
//! never treated as errors; a command whose payload is unexpectedly null is
//! declined with a warning instead of dereferenced.

use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::Ordering;

use tracing::{debug, info, trace, warn};

use retro_abi::{
    GameGeometry, HwRenderCallback, LogCallback, LogLevel, Message, PixelFormat, SystemAvInfo,
    Variable, ENV_GET_CAN_DUPE, ENV_GET_CORE_ASSETS_DIRECTORY, ENV_GET_LANGUAGE,
    ENV_GET_LOG_INTERFACE, ENV_GET_OVERSCAN, ENV_GET_SAVE_DIRECTORY, ENV_GET_SYSTEM_DIRECTORY,
    ENV_GET_USERNAME, ENV_GET_VARIABLE, ENV_GET_VARIABLE_UPDATE, ENV_SET_GEOMETRY,
    ENV_SET_HW_RENDER, ENV_SET_INPUT_DESCRIPTORS, ENV_SET_MESSAGE, ENV_SET_PERFORMANCE_LEVEL,
    ENV_SET_PIXEL_FORMAT, ENV_SET_SUPPORT_NO_GAME, ENV_SET_SYSTEM_AV_INFO, ENV_SET_VARIABLES,
    ENV_SHUTDOWN, LANGUAGE_ENGLISH,
};

use crate::bridge::BridgeShared;

/// Reborrow `data` as the payload type `cmd` implies, declining on null.
macro_rules! payload {
    ($cmd:expr, $data:expr, $ty:ty) => {{
        if $data.is_null() {
            warn!(cmd = $cmd, "null payload for a command that requires one, declining");
            return false;
        }
        // SAFETY: non-null and, per the calling convention, points to the
        // payload type this command code implies.
        unsafe { &mut *($data as *mut $ty) }
    }};
}

pub(crate) fn dispatch(bridge: &BridgeShared, cmd: u32, data: *mut c_void) -> bool {
    match cmd {
        ENV_GET_OVERSCAN => {
            // Modern host: no overscan cropping.
            *payload!(cmd, data, bool) = false;
            true
        }
        ENV_GET_CAN_DUPE => {
            *payload!(cmd, data, bool) = true;
            true
        }
        ENV_SET_MESSAGE => {
            let msg = payload!(cmd, data, Message);
            if msg.msg.is_null() {
                return false;
            }
            // SAFETY: non-null NUL-terminated message from the core.
            let text = unsafe { CStr::from_ptr(msg.msg) }.to_string_lossy();
            info!(frames = msg.frames, "core message: {text}");
            true
        }
        ENV_SHUTDOWN => {
            info!("core requested shutdown");
            bridge.flags.shutdown.store(true, Ordering::Release);
            true
        }
        ENV_SET_PERFORMANCE_LEVEL => {
            let level = *payload!(cmd, data, u32);
            debug!(level, "core declared performance level");
            bridge.flags.performance_level.store(level, Ordering::Relaxed);
            true
        }
        ENV_GET_SYSTEM_DIRECTORY => match bridge.dirs.system_dir() {
            Ok(c) => {
                *payload!(cmd, data, *const c_char) = c.as_ptr();
                true
            }
            Err(e) => {
                warn!(error = %e, "system directory unavailable");
                false
            }
        },
        ENV_GET_SAVE_DIRECTORY => match bridge.dirs.save_dir() {
            Ok(c) => {
                *payload!(cmd, data, *const c_char) = c.as_ptr();
                true
            }
            Err(e) => {
                warn!(error = %e, "save directory unavailable");
                false
            }
        },
        ENV_GET_CORE_ASSETS_DIRECTORY => match bridge.dirs.core_assets_dir() {
            Ok(c) => {
                *payload!(cmd, data, *const c_char) = c.as_ptr();
                true
            }
            Err(e) => {
                warn!(error = %e, "core assets directory unavailable");
                false
            }
        },
        ENV_SET_PIXEL_FORMAT => {
            let raw = *payload!(cmd, data, u32);
            let Some(format) = PixelFormat::from_raw(raw) else {
                warn!(raw, "unknown pixel format proposed");
                return false;
            };
            bridge.video.negotiate_format(format)
        }
        ENV_SET_INPUT_DESCRIPTORS => {
            // Descriptive metadata only; accepted and ignored.
            trace!("input descriptors announced");
            true
        }
        ENV_SET_HW_RENDER => {
            let cb = payload!(cmd, data, HwRenderCallback);
            // SAFETY: payload reborrowed above; the core owns it for the call.
            unsafe { bridge.hw.negotiate(cb) }
        }
        ENV_GET_VARIABLE => {
            let var = payload!(cmd, data, Variable);
            if var.key.is_null() {
                return false;
            }
            // SAFETY: non-null NUL-terminated key from the core.
            let key = match unsafe { CStr::from_ptr(var.key) }.to_str() {
                Ok(k) => k,
                Err(_) => return false,
            };
            match bridge.options.value_ptr(key) {
                Some(ptr) => {
                    var.value = ptr;
                    true
                }
                None => {
                    trace!(key, "variable not configured, declining");
                    var.value = std::ptr::null();
                    false
                }
            }
        }
        ENV_SET_VARIABLES => {
            if data.is_null() {
                warn!(cmd, "null payload for a command that requires one, declining");
                return false;
            }
            let mut entry = data as *const Variable;
            // SAFETY: SET_VARIABLES points at an array terminated by an
            // entry whose key is null; each key/value is NUL-terminated.
            unsafe {
                while !(*entry).key.is_null() {
                    let key = CStr::from_ptr((*entry).key).to_string_lossy();
                    let spec = if (*entry).value.is_null() {
                        String::new()
                    } else {
                        CStr::from_ptr((*entry).value).to_string_lossy().into_owned()
                    };
                    bridge.options.register_announced(&key, &spec);
                    entry = entry.add(1);
                }
            }
            true
        }
        ENV_GET_VARIABLE_UPDATE => {
            *payload!(cmd, data, bool) = bridge.options.take_update_flag();
            true
        }
        ENV_SET_SUPPORT_NO_GAME => {
            let supported = *payload!(cmd, data, bool);
            debug!(supported, "core declared contentless support");
            bridge.flags.support_no_game.store(supported, Ordering::Relaxed);
            true
        }
        ENV_GET_LOG_INTERFACE => {
            let cb = payload!(cmd, data, LogCallback);
            // The foreign signature is printf-variadic; stable Rust cannot
            // define such a function, so a two-argument one is transmuted to
            // the variadic pointer type. Extra variadic arguments are left
            // on the stack unread, which the C calling convention permits,
            // and the format string is logged verbatim.
            cb.log = Some(unsafe {
                std::mem::transmute::<
                    unsafe extern "C" fn(u32, *const c_char),
                    retro_abi::LogPrintfFn,
                >(core_log)
            });
            true
        }
        ENV_SET_SYSTEM_AV_INFO => {
            let av = payload!(cmd, data, SystemAvInfo);
            info!(
                fps = av.timing.fps,
                sample_rate = av.timing.sample_rate,
                "core replaced its AV info"
            );
            bridge.video.set_av_info(*av);
            true
        }
        ENV_SET_GEOMETRY => {
            let geometry = payload!(cmd, data, GameGeometry);
            bridge.video.set_geometry(*geometry);
            true
        }
        ENV_GET_USERNAME => match &bridge.username {
            Some(name) => {
                *payload!(cmd, data, *const c_char) = name.as_ptr();
                true
            }
            None => false,
        },
        ENV_GET_LANGUAGE => {
            *payload!(cmd, data, u32) = LANGUAGE_ENGLISH;
            true
        }
        other => {
            trace!(cmd = other, "unhandled environment command, declining");
            false
        }
    }
}

/// The function behind the log interface handed to the core. The format
/// string is logged verbatim; placeholder expansion is out of scope, and
/// cores embedding positional arguments see their format text unexpanded.
unsafe extern "C" fn core_log(level: u32, fmt: *const c_char) {
    if fmt.is_null() {
        return;
    }
    // SAFETY: cores pass a NUL-terminated format string.
    let text = unsafe { CStr::from_ptr(fmt) }.to_string_lossy();
    let text = text.trim_end_matches('\n');
    match LogLevel::from_raw(level) {
        LogLevel::Debug => debug!(target: "retro_core", "{text}"),
        LogLevel::Info => info!(target: "retro_core", "{text}"),
        LogLevel::Warn => warn!(target: "retro_core", "{text}"),
        LogLevel::Error => tracing::error!(target: "retro_core", "{text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeShared;
    use crate::config::HostConfig;
    use crossbeam_channel::bounded;
    use std::ffi::CString;

    fn test_bridge(tag: &str) -> (BridgeShared, std::path::PathBuf) {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("retro_env_{tag}_{ts}"));
        let config = HostConfig {
            content_root: root.clone(),
            ..HostConfig::default()
        };
        let (frame_tx, _frame_rx) = bounded(8);
        let (audio_tx, _audio_rx) = bounded(8);
        // Receivers are dropped; publishes become no-ops, which these tests
        // never exercise anyway.
        (BridgeShared::new(&config, "EnvTestCore", frame_tx, audio_tx), root)
    }

    fn cleanup(root: &std::path::Path) {
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn pixel_format_negotiation_accepts_xrgb8888_only() {
        let (bridge, root) = test_bridge("pixfmt");

        let mut fmt = PixelFormat::Xrgb8888 as u32;
        assert!(dispatch(
            &bridge,
            ENV_SET_PIXEL_FORMAT,
            &mut fmt as *mut u32 as *mut c_void
        ));
        assert_eq!(bridge.video.pixel_format(), PixelFormat::Xrgb8888);

        // Declined proposal leaves the negotiated format unchanged.
        let mut fmt = PixelFormat::Rgb565 as u32;
        assert!(!dispatch(
            &bridge,
            ENV_SET_PIXEL_FORMAT,
            &mut fmt as *mut u32 as *mut c_void
        ));
        assert_eq!(bridge.video.pixel_format(), PixelFormat::Xrgb8888);
        cleanup(&root);
    }

    #[test]
    fn save_directory_query_creates_and_returns_the_path() {
        let (bridge, root) = test_bridge("savedir");
        let mut out: *const c_char = std::ptr::null();
        assert!(dispatch(
            &bridge,
            ENV_GET_SAVE_DIRECTORY,
            &mut out as *mut *const c_char as *mut c_void
        ));
        assert!(!out.is_null());
        let path = unsafe { CStr::from_ptr(out) }.to_str().unwrap();
        assert!(path.ends_with("saves"));
        assert!(std::path::Path::new(path).is_dir());
        cleanup(&root);
    }

    #[test]
    fn null_payload_is_declined_not_dereferenced() {
        let (bridge, root) = test_bridge("null");
        assert!(!dispatch(&bridge, ENV_SET_PIXEL_FORMAT, std::ptr::null_mut()));
        assert!(!dispatch(&bridge, ENV_GET_SAVE_DIRECTORY, std::ptr::null_mut()));
        assert!(!dispatch(&bridge, ENV_GET_VARIABLE, std::ptr::null_mut()));
        cleanup(&root);
    }

    #[test]
    fn unknown_command_is_declined() {
        let (bridge, root) = test_bridge("unknown");
        let mut scratch = 0u64;
        assert!(!dispatch(
            &bridge,
            0xDEAD,
            &mut scratch as *mut u64 as *mut c_void
        ));
        cleanup(&root);
    }

    #[test]
    fn variable_round_trip_with_announcement_defaults() {
        let (bridge, root) = test_bridge("vars");

        // Core announces its variables; defaults get registered.
        let key = CString::new("scaling").unwrap();
        let spec = CString::new("Scaling; 1x|2x").unwrap();
        let vars = [
            Variable {
                key: key.as_ptr(),
                value: spec.as_ptr(),
            },
            Variable {
                key: std::ptr::null(),
                value: std::ptr::null(),
            },
        ];
        assert!(dispatch(
            &bridge,
            ENV_SET_VARIABLES,
            vars.as_ptr() as *mut c_void
        ));

        // Core queries the variable back.
        let mut query = Variable {
            key: key.as_ptr(),
            value: std::ptr::null(),
        };
        assert!(dispatch(
            &bridge,
            ENV_GET_VARIABLE,
            &mut query as *mut Variable as *mut c_void
        ));
        let got = unsafe { CStr::from_ptr(query.value) }.to_str().unwrap();
        assert_eq!(got, "1x");

        // Unknown key declines and nulls the value.
        let missing = CString::new("nope").unwrap();
        let mut query = Variable {
            key: missing.as_ptr(),
            value: spec.as_ptr(),
        };
        assert!(!dispatch(
            &bridge,
            ENV_GET_VARIABLE,
            &mut query as *mut Variable as *mut c_void
        ));
        assert!(query.value.is_null());
        cleanup(&root);
    }

    #[test]
    fn variable_update_flag_reads_once() {
        let (bridge, root) = test_bridge("update");
        bridge.options.set("key", "value");

        let mut updated = false;
        assert!(dispatch(
            &bridge,
            ENV_GET_VARIABLE_UPDATE,
            &mut updated as *mut bool as *mut c_void
        ));
        assert!(updated);

        assert!(dispatch(
            &bridge,
            ENV_GET_VARIABLE_UPDATE,
            &mut updated as *mut bool as *mut c_void
        ));
        assert!(!updated);
        cleanup(&root);
    }

    #[test]
    fn fixed_answers_for_language_dupe_and_overscan() {
        let (bridge, root) = test_bridge("fixed");

        let mut language = 99u32;
        assert!(dispatch(
            &bridge,
            ENV_GET_LANGUAGE,
            &mut language as *mut u32 as *mut c_void
        ));
        assert_eq!(language, LANGUAGE_ENGLISH);

        let mut can_dupe = false;
        assert!(dispatch(
            &bridge,
            ENV_GET_CAN_DUPE,
            &mut can_dupe as *mut bool as *mut c_void
        ));
        assert!(can_dupe);

        let mut overscan = true;
        assert!(dispatch(
            &bridge,
            ENV_GET_OVERSCAN,
            &mut overscan as *mut bool as *mut c_void
        ));
        assert!(!overscan);
        cleanup(&root);
    }

    #[test]
    fn shutdown_command_sets_the_session_flag() {
        let (bridge, root) = test_bridge("shutdown");
        assert!(!bridge.flags.shutdown.load(Ordering::Acquire));
        assert!(dispatch(&bridge, ENV_SHUTDOWN, std::ptr::null_mut()));
        assert!(bridge.flags.shutdown.load(Ordering::Acquire));
        cleanup(&root);
    }

    #[test]
    fn username_answers_only_when_configured() {
        let (bridge, root) = test_bridge("anon");
        let mut out: *const c_char = std::ptr::null();
        assert!(!dispatch(
            &bridge,
            ENV_GET_USERNAME,
            &mut out as *mut *const c_char as *mut c_void
        ));

        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let named_root = std::env::temp_dir().join(format!("retro_env_user_{ts}"));
        let config = HostConfig {
            content_root: named_root.clone(),
            username: Some("player1".to_string()),
            ..HostConfig::default()
        };
        let (frame_tx, _frame_rx) = bounded(8);
        let (audio_tx, _audio_rx) = bounded(8);
        let named = BridgeShared::new(&config, "EnvTestCore", frame_tx, audio_tx);
        assert!(dispatch(
            &named,
            ENV_GET_USERNAME,
            &mut out as *mut *const c_char as *mut c_void
        ));
        assert_eq!(
            unsafe { CStr::from_ptr(out) }.to_str().unwrap(),
            "player1"
        );
        cleanup(&root);
        cleanup(&named_root);
    }

    #[test]
    fn log_interface_is_filled_in() {
        let (bridge, root) = test_bridge("log");
        let mut cb = LogCallback { log: None };
        assert!(dispatch(
            &bridge,
            ENV_GET_LOG_INTERFACE,
            &mut cb as *mut LogCallback as *mut c_void
        ));
        let log = cb.log.expect("log fn must be filled");
        let line = CString::new("core says hello").unwrap();
        // SAFETY: calling with zero variadic arguments, which core_log never
        // reads.
        unsafe { log(1, line.as_ptr()) };
        cleanup(&root);
    }
}
