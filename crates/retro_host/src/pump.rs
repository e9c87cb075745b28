// crates/retro_host/src/pump.rs
//! Frame pump: non-reentrant tick guard and the wall-clock pacer that
//! schedules ticks at the core's reported frame rate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// What a tick request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame callback ran.
    Ran,
    /// A previous tick was still executing; this one was skipped whole.
    DroppedInFlight,
    /// The pump has been invalidated; no work was attempted.
    Invalidated,
}

/// Serializes frame execution without blocking the caller.
///
/// Ticks may be requested from any thread, but at most one frame body runs
/// at a time. A tick that arrives while another is in flight is dropped,
/// never queued: running it late would only push the session further behind
/// real time.
pub(crate) struct FramePump {
    in_flight: AtomicBool,
    invalidated: AtomicBool,
    dropped: AtomicU64,
}

impl FramePump {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            invalidated: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Run `frame` unless a tick is already in flight or the pump has been
    /// invalidated. The in-flight flag is cleared even if `frame` panics, so
    /// a poisoned frame body cannot wedge the pump.
    pub(crate) fn tick<F: FnOnce()>(&self, frame: F) -> TickOutcome {
        if self.invalidated.load(Ordering::Acquire) {
            return TickOutcome::Invalidated;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(dropped, "tick arrived while a frame was in flight");
            return TickOutcome::DroppedInFlight;
        }

        struct Reset<'a>(&'a AtomicBool);
        impl Drop for Reset<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::Release);
            }
        }
        let _reset = Reset(&self.in_flight);

        // Invalidation may have raced the flag acquisition; re-check before
        // touching the core.
        if self.invalidated.load(Ordering::Acquire) {
            return TickOutcome::Invalidated;
        }
        frame();
        TickOutcome::Ran
    }

    /// Permanently stop the pump. In-flight work finishes; every later tick
    /// returns [`TickOutcome::Invalidated`]. Part of teardown ordering: the
    /// pump dies before the core's entry points do.
    pub(crate) fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
        debug!(
            dropped_total = self.dropped.load(Ordering::Relaxed),
            "frame pump invalidated"
        );
    }

    pub(crate) fn dropped_ticks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Wall-clock scheduler for tick requests, driven by the embedder's loop.
///
/// Keeps an absolute deadline rather than sleeping a fixed interval, so
/// jitter in one frame does not accumulate. If the caller falls more than a
/// few frames behind, the deadline resyncs to now instead of bursting to
/// catch up.
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

const MAX_BACKLOG_FRAMES: u32 = 3;

impl FramePacer {
    /// Pacer for a core that reports `fps` frames per second. Falls back to
    /// 60 if the core reports a nonsensical rate.
    pub fn from_fps(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 1.0 { fps } else { 60.0 };
        let interval = Duration::from_secs_f64(1.0 / fps);
        Self {
            interval,
            next: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next frame deadline, then advance it. Returns the
    /// number of whole intervals skipped when resyncing after a stall.
    pub fn wait(&mut self) -> u32 {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
        }
        let now = Instant::now();
        let mut skipped = 0u32;
        self.next += self.interval;
        while self.next + self.interval * MAX_BACKLOG_FRAMES < now {
            self.next += self.interval;
            skipped += 1;
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::{Arc, Barrier};

    #[test]
    fn concurrent_ticks_run_exactly_one_frame() {
        let pump = Arc::new(FramePump::new());
        let ran = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Barrier::new(2));

        // First tick parks inside the frame body until the second tick has
        // been attempted and dropped.
        let slow = {
            let pump = Arc::clone(&pump);
            let ran = Arc::clone(&ran);
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                pump.tick(|| {
                    gate.wait(); // frame is now in flight
                    gate.wait(); // hold until the overlap was observed
                    ran.fetch_add(1, Ordering::SeqCst);
                })
            })
        };

        gate.wait();
        assert_eq!(pump.tick(|| panic!("must not run")), TickOutcome::DroppedInFlight);
        gate.wait();

        assert_eq!(slow.join().unwrap(), TickOutcome::Ran);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(pump.dropped_ticks(), 1);
    }

    #[test]
    fn invalidation_is_permanent() {
        let pump = FramePump::new();
        assert_eq!(pump.tick(|| {}), TickOutcome::Ran);
        pump.invalidate();
        assert_eq!(pump.tick(|| panic!("must not run")), TickOutcome::Invalidated);
        assert_eq!(pump.tick(|| panic!("must not run")), TickOutcome::Invalidated);
    }

    #[test]
    fn panicking_frame_does_not_wedge_the_pump() {
        let pump = FramePump::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pump.tick(|| panic!("core exploded"));
        }));
        assert!(result.is_err());
        assert_eq!(pump.tick(|| {}), TickOutcome::Ran);
    }

    #[test]
    fn pacer_rejects_nonsense_rates() {
        assert_eq!(FramePacer::from_fps(0.0).interval(), FramePacer::from_fps(60.0).interval());
        assert_eq!(
            FramePacer::from_fps(f64::NAN).interval(),
            Duration::from_secs_f64(1.0 / 60.0)
        );
        let pal = FramePacer::from_fps(50.0);
        assert_eq!(pal.interval(), Duration::from_secs_f64(1.0 / 50.0));
    }

    #[test]
    fn pacer_resyncs_after_a_stall() {
        let mut pacer = FramePacer::from_fps(1000.0);
        pacer.wait();
        std::thread::sleep(Duration::from_millis(20));
        let skipped = pacer.wait();
        assert!(skipped > 0, "expected skipped intervals after a stall");
        // Deadline is near now again, so the next wait is short.
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
