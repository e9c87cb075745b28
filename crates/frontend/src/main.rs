// crates/frontend/src/main.rs
//! Headless reference frontend: load a core, run it for a while, report what
//! came out. Useful for smoke-testing cores without a UI.
//!
//! Usage: frontend <core.so> <content> [--frames N] [--config host.json]

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use retro_host::{FrameEvent, HostConfig, HostError, Session, TickOutcome};

struct Args {
    core: PathBuf,
    content: PathBuf,
    frames: u64,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut raw = std::env::args().skip(1);
    let core = raw.next().ok_or("missing core path")?;
    let content = raw.next().ok_or("missing content path")?;
    let mut args = Args {
        core: PathBuf::from(core),
        content: PathBuf::from(content),
        frames: 600,
        config: None,
    };
    while let Some(flag) = raw.next() {
        match flag.as_str() {
            "--frames" => {
                let n = raw.next().ok_or("--frames requires a value")?;
                args.frames = n.parse().map_err(|_| format!("bad frame count '{n}'"))?;
            }
            "--config" => {
                let p = raw.next().ok_or("--config requires a value")?;
                args.config = Some(PathBuf::from(p));
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(args)
}

fn run(args: &Args) -> Result<(), HostError> {
    let config = match &args.config {
        Some(path) => HostConfig::from_file(path)?,
        None => HostConfig::default(),
    };

    // SAFETY: the user pointed us at this library; loading it is the
    // program's whole purpose.
    let mut session = unsafe { Session::load(&args.core, config)? };
    info!(
        core = %session.identity().name,
        version = %session.identity().version,
        "core loaded"
    );

    session.load_game(Some(&args.content))?;
    let av = session.av_info().unwrap_or_default();
    let mut pacer = session.pacer();

    let mut software_frames = 0u64;
    let mut hardware_frames = 0u64;
    let mut audio_samples = 0u64;

    for _ in 0..args.frames {
        pacer.wait();
        if session.run_frame()? != TickOutcome::Ran {
            continue;
        }
        while let Ok(event) = session.frames().try_recv() {
            match event {
                FrameEvent::Frame(_) => software_frames += 1,
                FrameEvent::HardwareRendered { .. } => hardware_frames += 1,
            }
        }
        while let Ok(batch) = session.audio().try_recv() {
            audio_samples += batch.samples.len() as u64;
        }
        if session.shutdown_requested() {
            info!("core requested shutdown");
            break;
        }
    }

    info!(
        width = av.geometry.base_width,
        height = av.geometry.base_height,
        fps = av.timing.fps,
        software_frames,
        hardware_frames,
        audio_samples,
        dropped_ticks = session.dropped_ticks(),
        "run complete"
    );
    session.stop();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("usage: frontend <core.so> <content> [--frames N] [--config host.json]");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "session failed");
            ExitCode::FAILURE
        }
    }
}
