//! Capture backend seam and the cpal implementation.
//!
//! The backend's only jobs are device enumeration and pushing raw samples
//! into a channel from its own thread. Keeping the cpal stream confined to
//! that thread keeps everything the orchestrator holds `Send`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Sender};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::chunk::AudioSpec;
use crate::error::{CoreError, CoreResult};

/// An available audio input device.
#[derive(Debug, Clone, Serialize)]
pub struct InputDevice {
    pub index: usize,
    pub name: String,
    pub sample_rate: u32,
}

/// Raw events flowing from the backend thread to the chunker worker.
#[derive(Debug)]
pub enum CaptureEvent {
    Samples(Vec<f32>),
    Error(String),
}

/// Source of raw capture samples.
///
/// `start` must spawn its own feed (thread or callback chain), deliver
/// `CaptureEvent`s through `tx`, honor `stop`, and drop `tx` when the feed
/// ends so the consumer observes a closed channel.
pub trait CaptureBackend: Send + Sync {
    fn list_input_devices(&self) -> CoreResult<Vec<InputDevice>>;

    fn start(
        &self,
        device: Option<usize>,
        spec: AudioSpec,
        tx: Sender<CaptureEvent>,
        stop: Arc<AtomicBool>,
    ) -> CoreResult<()>;
}

/// Production backend bound to the default cpal host.
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn resolve_device(device: Option<usize>) -> CoreResult<cpal::Device> {
        let host = cpal::default_host();
        match device {
            Some(index) => host
                .input_devices()
                .map_err(|e| CoreError::DeviceUnavailable(e.to_string()))?
                .nth(index)
                .ok_or_else(|| {
                    CoreError::DeviceUnavailable(format!("no input device at index {index}"))
                }),
            None => host
                .default_input_device()
                .ok_or_else(|| CoreError::DeviceUnavailable("no default input device".into())),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CpalBackend {
    fn list_input_devices(&self) -> CoreResult<Vec<InputDevice>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CoreError::DeviceUnavailable(e.to_string()))?;

        let mut out = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            let sample_rate = device
                .default_input_config()
                .map(|c| c.sample_rate().0)
                .unwrap_or(0);
            out.push(InputDevice {
                index,
                name,
                sample_rate,
            });
        }
        Ok(out)
    }

    fn start(
        &self,
        device: Option<usize>,
        spec: AudioSpec,
        tx: Sender<CaptureEvent>,
        stop: Arc<AtomicBool>,
    ) -> CoreResult<()> {
        // The stream must be built and kept on one thread; hand the result
        // of the setup back through a handshake channel so callers get a
        // synchronous DeviceUnavailable instead of a dead capture.
        let (ready_tx, ready_rx) = sync_channel::<CoreResult<()>>(1);

        std::thread::Builder::new()
            .name("meetscribe-cpal".into())
            .spawn(move || {
                let device = match Self::resolve_device(device) {
                    Ok(d) => d,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!(
                    "Capture using device: {}",
                    device.name().unwrap_or_else(|_| "unknown".to_string())
                );

                let config = cpal::StreamConfig {
                    channels: spec.channels,
                    sample_rate: cpal::SampleRate(spec.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let data_tx = tx.clone();
                let err_tx = tx.clone();
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let _ = data_tx.send(CaptureEvent::Samples(data.to_vec()));
                    },
                    move |err| {
                        error!("Capture stream error: {}", err);
                        let _ = err_tx.send(CaptureEvent::Error(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(CoreError::DeviceUnavailable(e.to_string())));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CoreError::CaptureIo(e.to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(()));

                while !stop.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(50));
                }

                debug!("Stopping cpal capture stream");
                drop(stream);
                drop(tx);
            })
            .map_err(|e| CoreError::CaptureIo(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(result) => result,
            Err(_) => {
                warn!("Capture thread did not report readiness in time");
                Err(CoreError::CaptureIo(
                    "capture thread failed to start in time".into(),
                ))
            }
        }
    }
}
