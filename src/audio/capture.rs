//! Audio capture controller.
//!
//! Owns the device binding and a dedicated chunker worker. The backend
//! thread pushes raw sample blocks into an mpsc channel; the worker slices
//! them into fixed-size `AudioChunk`s, invokes the chunk callback, and
//! appends every sample to the append-only session waveform. The caller is
//! never blocked by capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::backend::{CaptureBackend, CaptureEvent, InputDevice};
use super::chunk::{AudioChunk, AudioSpec};
use crate::error::{CoreError, CoreResult};

/// Callback invoked by the capture worker for every emitted chunk.
pub type ChunkCallback = Box<dyn FnMut(AudioChunk) + Send>;

/// Everything a finished capture hands back.
///
/// A mid-capture read error does not discard audio: samples gathered before
/// the failure are returned alongside the error message.
#[derive(Debug)]
pub struct CaptureOutcome {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub read_error: Option<String>,
}

pub struct AudioCaptureController {
    backend: Arc<dyn CaptureBackend>,
    spec: AudioSpec,
    device: Option<usize>,
    initialized: bool,
    active: bool,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    // `std::sync::mpsc::Receiver` is `Send` but not `Sync`; wrapping it in a
    // `Mutex` keeps `AudioCaptureController` (and thus the orchestrator that
    // owns it) `Sync` so handlers can hold it across `.await`. Access stays
    // single-threaded via `&mut self`.
    done_rx: Option<Mutex<Receiver<()>>>,
    waveform: Arc<Mutex<Vec<f32>>>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl AudioCaptureController {
    pub fn new(backend: Arc<dyn CaptureBackend>, spec: AudioSpec) -> Self {
        Self {
            backend,
            spec,
            device: None,
            initialized: false,
            active: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
            done_rx: None,
            waveform: Arc::new(Mutex::new(Vec::new())),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Pure query; works before any capture starts.
    pub fn list_input_devices(&self) -> CoreResult<Vec<InputDevice>> {
        self.backend.list_input_devices()
    }

    /// Bind the configured device. Validates that the device exists without
    /// opening a stream.
    pub fn initialize(&mut self, device: Option<usize>) -> CoreResult<()> {
        let devices = self.backend.list_input_devices()?;
        match device {
            Some(index) if index >= devices.len() => {
                return Err(CoreError::DeviceUnavailable(format!(
                    "input device index {index} out of range ({} available)",
                    devices.len()
                )));
            }
            None if devices.is_empty() => {
                return Err(CoreError::DeviceUnavailable(
                    "no audio input devices found".into(),
                ));
            }
            _ => {}
        }

        self.device = device;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    /// Error recorded by the capture worker, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|g| g.clone())
    }

    /// Launch the capture worker. Returns once the device stream is live.
    pub fn start(&mut self, on_chunk: ChunkCallback) -> CoreResult<()> {
        if !self.initialized {
            return Err(CoreError::CaptureIo("capture not initialized".into()));
        }
        if self.active {
            return Err(CoreError::CaptureIo("capture already active".into()));
        }

        {
            let mut waveform = lock_or_poisoned(&self.waveform);
            waveform.clear();
            waveform.shrink_to_fit();
        }
        *lock_or_poisoned(&self.last_error) = None;
        self.stop_flag.store(false, Ordering::SeqCst);

        let (event_tx, event_rx) = mpsc::channel::<CaptureEvent>();
        self.backend
            .start(self.device, self.spec, event_tx, self.stop_flag.clone())?;

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let spec = self.spec;
        let waveform = self.waveform.clone();
        let last_error = self.last_error.clone();

        let worker = std::thread::Builder::new()
            .name("meetscribe-chunker".into())
            .spawn(move || {
                run_chunker(spec, event_rx, on_chunk, waveform, last_error);
                let _ = done_tx.send(());
            })
            .map_err(|e| CoreError::CaptureIo(format!("failed to spawn chunk worker: {e}")))?;

        self.worker = Some(worker);
        self.done_rx = Some(Mutex::new(done_rx));
        self.active = true;

        info!("Audio capture started ({} Hz)", self.spec.sample_rate);
        Ok(())
    }

    /// Signal the worker to exit, wait a bounded grace period for it to
    /// drain, and return the accumulated waveform.
    pub fn stop(&mut self) -> CoreResult<CaptureOutcome> {
        if !self.active {
            return Err(CoreError::CaptureIo("capture is not active".into()));
        }

        self.stop_flag.store(true, Ordering::SeqCst);

        let grace = self.drain_grace();
        if let Some(done_rx) = self.done_rx.take() {
            let done_rx = done_rx.into_inner().unwrap_or_else(|e| e.into_inner());
            match done_rx.recv_timeout(grace) {
                Ok(()) => {
                    if let Some(worker) = self.worker.take() {
                        let _ = worker.join();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Detach rather than block the stop indefinitely. The
                    // waveform so far is still returned.
                    warn!(
                        "Capture worker did not drain within {:?}; detaching",
                        grace
                    );
                    self.worker.take();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(worker) = self.worker.take() {
                        let _ = worker.join();
                    }
                }
            }
        }

        self.active = false;

        let samples = std::mem::take(&mut *lock_or_poisoned(&self.waveform));
        let read_error = lock_or_poisoned(&self.last_error).clone();

        info!("Audio capture stopped, {} samples captured", samples.len());

        Ok(CaptureOutcome {
            samples,
            sample_rate: self.spec.sample_rate,
            channels: self.spec.channels,
            read_error,
        })
    }

    fn drain_grace(&self) -> Duration {
        let chunk_period = Duration::from_secs_f64(self.spec.chunk_period_secs());
        (chunk_period * 4).max(Duration::from_secs(3))
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active AudioCaptureController, cleaning up");
            let _ = self.stop();
        }
    }
}

/// Chunker loop: raw sample blocks in, fixed-size sequenced chunks out.
fn run_chunker(
    spec: AudioSpec,
    event_rx: Receiver<CaptureEvent>,
    mut on_chunk: ChunkCallback,
    waveform: Arc<Mutex<Vec<f32>>>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    let chunk_samples = spec.samples_per_chunk();
    let mut pending: Vec<f32> = Vec::with_capacity(chunk_samples * 2);
    let mut sequence: u64 = 0;

    for event in event_rx.iter() {
        match event {
            CaptureEvent::Samples(samples) => {
                pending.extend_from_slice(&samples);

                while pending.len() >= chunk_samples {
                    let rest = pending.split_off(chunk_samples);
                    let block = std::mem::replace(&mut pending, rest);
                    emit_chunk(block, &mut sequence, &waveform, &mut on_chunk);
                }
            }
            CaptureEvent::Error(message) => {
                // Stop gracefully: keep everything captured so far and let
                // the next stop()/status call observe the error.
                warn!("Capture read error, stopping worker: {}", message);
                *lock_or_poisoned(&last_error) = Some(message);
                break;
            }
        }
    }

    // Final partial chunk: pad to a whole frame, never drop it.
    if !pending.is_empty() {
        let frame = spec.channels as usize;
        let remainder = pending.len() % frame;
        if remainder != 0 {
            pending.resize(pending.len() + frame - remainder, 0.0);
        }
        emit_chunk(pending, &mut sequence, &waveform, &mut on_chunk);
    }

    debug!("Chunk worker exited after {} chunks", sequence);
}

fn emit_chunk(
    samples: Vec<f32>,
    sequence: &mut u64,
    waveform: &Arc<Mutex<Vec<f32>>>,
    on_chunk: &mut ChunkCallback,
) {
    lock_or_poisoned(waveform).extend_from_slice(&samples);

    let chunk = AudioChunk {
        samples,
        sequence: *sequence,
        captured_at: Utc::now(),
    };
    *sequence += 1;
    on_chunk(chunk);
}

fn lock_or_poisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FakeBackend, FakeBackendOptions};
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn spec() -> AudioSpec {
        AudioSpec {
            sample_rate: 16000,
            channels: 1,
            chunk_size: 512,
        }
    }

    fn controller(options: FakeBackendOptions) -> AudioCaptureController {
        AudioCaptureController::new(Arc::new(FakeBackend::new(options)), spec())
    }

    fn wait_for_samples(controller: &AudioCaptureController, want: usize) {
        for _ in 0..200 {
            let have = controller.waveform.lock().unwrap().len();
            if have >= want {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_list_devices_before_capture() {
        let controller = controller(FakeBackendOptions::default());
        let devices = controller.list_input_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Fake Microphone");
    }

    #[test]
    fn test_initialize_rejects_out_of_range_device() {
        let mut controller = controller(FakeBackendOptions::default());
        let err = controller.initialize(Some(3)).unwrap_err();
        assert_eq!(err.code(), "device_unavailable");
        assert!(!controller.is_initialized());
    }

    #[test]
    fn test_chunks_are_fixed_size_and_sequenced() {
        let mut controller = controller(FakeBackendOptions {
            total_samples: 2048,
            ..Default::default()
        });
        controller.initialize(None).unwrap();

        let chunks: Arc<Mutex<Vec<AudioChunk>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = chunks.clone();
        controller
            .start(Box::new(move |chunk| sink.lock().unwrap().push(chunk)))
            .unwrap();

        wait_for_samples(&controller, 2048);
        let outcome = controller.stop().unwrap();

        assert_eq!(outcome.samples.len(), 2048);
        assert!(outcome.read_error.is_none());

        let chunks = chunks.lock().unwrap();
        assert_eq!(chunks.len(), 4);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i as u64);
            assert_eq!(chunk.samples.len(), 512);
        }
    }

    #[test]
    fn test_partial_final_chunk_is_kept() {
        // 1300 samples = 2 full chunks of 512 plus a 276-sample tail.
        let mut controller = controller(FakeBackendOptions {
            total_samples: 1300,
            block_size: 100,
            ..Default::default()
        });
        controller.initialize(None).unwrap();

        let count = Arc::new(AtomicU64::new(0));
        let sink = count.clone();
        controller
            .start(Box::new(move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        wait_for_samples(&controller, 1300);
        let outcome = controller.stop().unwrap();

        // Tail audio is preserved, not dropped.
        assert_eq!(outcome.samples.len(), 1300);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_read_error_preserves_prior_audio() {
        let mut controller = controller(FakeBackendOptions {
            total_samples: 4096,
            fail_after: Some(1024),
            ..Default::default()
        });
        controller.initialize(None).unwrap();
        controller.start(Box::new(|_| {})).unwrap();

        wait_for_samples(&controller, 1024);
        std::thread::sleep(Duration::from_millis(50));
        let outcome = controller.stop().unwrap();

        assert_eq!(outcome.samples.len(), 1024);
        let error = outcome.read_error.expect("read error should surface");
        assert!(error.contains("synthetic device read failure"));
    }

    #[test]
    fn test_stop_immediately_after_start() {
        let mut controller = controller(FakeBackendOptions {
            total_samples: 0,
            ..Default::default()
        });
        controller.initialize(None).unwrap();
        controller.start(Box::new(|_| {})).unwrap();

        let outcome = controller.stop().unwrap();
        assert!(outcome.samples.is_empty());
        assert!(outcome.read_error.is_none());
        assert!(!controller.is_active());
    }

    #[test]
    fn test_stop_without_start_fails() {
        let mut controller = controller(FakeBackendOptions::default());
        controller.initialize(None).unwrap();
        assert!(controller.stop().is_err());
    }

    #[test]
    fn test_restart_clears_previous_waveform() {
        let mut controller = controller(FakeBackendOptions {
            total_samples: 512,
            ..Default::default()
        });
        controller.initialize(None).unwrap();

        controller.start(Box::new(|_| {})).unwrap();
        wait_for_samples(&controller, 512);
        let first = controller.stop().unwrap();
        assert_eq!(first.samples.len(), 512);

        controller.start(Box::new(|_| {})).unwrap();
        wait_for_samples(&controller, 512);
        let second = controller.stop().unwrap();
        assert_eq!(second.samples.len(), 512);
    }
}
