// crates/retro_host/src/audio.rs
//! Audio callback handling: interleaved 16-bit stereo in, normalized f32
//! batches out.

use std::sync::Mutex;

use crossbeam_channel::{Sender, TrySendError};
use tracing::trace;

/// One batch of interleaved stereo samples, normalized to [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct AudioBatch {
    /// Interleaved left/right pairs, `frames * 2` entries.
    pub samples: Vec<f32>,
    pub frames: usize,
}

/// i16 PCM to f32, dividing by 32768 so i16::MIN maps exactly to -1.0.
/// i16::MAX lands just under 1.0, which is fine for playback.
pub(crate) fn convert_batch(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| f32::from(s) / 32768.0).collect()
}

/// Host side of the audio callbacks.
///
/// Cores use one of two shapes: the batch callback delivering whole buffers,
/// or the single-sample callback delivering one stereo pair per call. Singles
/// are accumulated and flushed as one batch after each run call so the
/// embedder sees a uniform stream either way.
pub(crate) struct AudioBridge {
    batches: Sender<AudioBatch>,
    pending: Mutex<Vec<f32>>,
}

impl AudioBridge {
    pub(crate) fn new(batches: Sender<AudioBatch>) -> Self {
        Self {
            batches,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Batch callback body. `pcm` must hold `frames * 2` interleaved
    /// samples; the slice is only valid during the callback, so conversion
    /// copies everything out. Returns the number of frames consumed.
    pub(crate) fn on_batch(&self, pcm: &[i16], frames: usize) -> usize {
        if frames == 0 {
            return 0;
        }
        self.publish(AudioBatch {
            samples: convert_batch(pcm),
            frames,
        });
        frames
    }

    /// Single-sample callback body; buffered until [`flush_pending`].
    pub(crate) fn on_sample(&self, left: i16, right: i16) {
        let mut pending = lock(&self.pending);
        pending.push(f32::from(left) / 32768.0);
        pending.push(f32::from(right) / 32768.0);
    }

    /// Drain accumulated single samples into one batch. Called once after
    /// every run call.
    pub(crate) fn flush_pending(&self) {
        let samples = std::mem::take(&mut *lock(&self.pending));
        if samples.is_empty() {
            return;
        }
        let frames = samples.len() / 2;
        self.publish(AudioBatch { samples, frames });
    }

    fn publish(&self, batch: AudioBatch) {
        match self.batches.try_send(batch) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("audio channel full, dropping batch"),
            Err(TrySendError::Disconnected(_)) => trace!("audio receiver gone"),
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
    fn conversion_maps_the_i16_range() {
        let out = convert_batch(&[i16::MIN, 0, i16::MAX]);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
        assert!(out[2] > 0.999 && out[2] < 1.0);
    }

    #[test]
    fn batch_callback_reports_frames_consumed() {
        let (tx, rx) = bounded(4);
        let audio = AudioBridge::new(tx);

        let pcm = [100i16, -100, 200, -200];
        assert_eq!(audio.on_batch(&pcm, 2), 2);

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.frames, 2);
        assert_eq!(batch.samples.len(), 4);
        assert_eq!(batch.samples[0], 100.0 / 32768.0);
    }

    #[test]
    fn single_samples_flush_as_one_batch() {
        let (tx, rx) = bounded(4);
        let audio = AudioBridge::new(tx);

        audio.on_sample(1000, -1000);
        audio.on_sample(2000, -2000);
        assert!(rx.try_recv().is_err()); // nothing until flush

        audio.flush_pending();
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.frames, 2);
        assert_eq!(batch.samples[3], -2000.0 / 32768.0);

        // Empty flush sends nothing.
        audio.flush_pending();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        let audio = AudioBridge::new(tx);
        assert_eq!(audio.on_batch(&[0, 0], 1), 1);
        assert_eq!(audio.on_batch(&[0, 0], 1), 1); // dropped, still consumed
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
