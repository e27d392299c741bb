//! Audio output using cpal
//!
//! Manages audio device output with callback-based playback. The callback
//! pulls mono frames from the session scheduler, resamples them to the
//! device rate, and duplicates them across the device's channels.
//!
//! cpal streams are not `Send`, so the device path runs on a dedicated
//! thread that owns the stream for the lifetime of the session. A null sink
//! is provided for headless operation: it drives the scheduler clock from a
//! tokio task at real-time pace without touching any hardware.

use crate::audio::resampler::StreamResampler;
use crate::audio::types::SYNTHESIS_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::playback::scheduler::PlaybackScheduler;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Audio output manager using cpal.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    volume: Arc<Mutex<f32>>,
    /// Stream error flag - set by audio callback on error
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// List available audio output devices.
    ///
    /// Used by the GET /audio/devices API endpoint.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open audio device for output with shared volume control.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `volume`: Shared volume Arc, applied in the audio callback
    ///
    /// # Fallback Behavior
    /// If the requested device fails to open, the default device is used.
    pub fn new_with_volume(device_name: Option<String>, volume: Arc<Mutex<f32>>) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                Some(dev) => {
                    info!("Found requested audio device: {}", name);
                    dev
                }
                None => {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                    host.default_output_device().ok_or_else(|| {
                        Error::AudioOutput(format!(
                            "Device '{}' not found and no default device available",
                            name
                        ))
                    })?
                }
            }
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?
        };

        let (config, sample_format) = Self::get_best_config(&device)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            volume,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the best supported configuration for playback.
    ///
    /// Prefers a config that can run at the synthesis rate with f32 samples,
    /// which removes the resampling step entirely; otherwise falls back to
    /// the device default and the caller resamples.
    fn get_best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported_configs.find(|config| {
            config.min_sample_rate().0 <= SYNTHESIS_SAMPLE_RATE
                && config.max_sample_rate().0 >= SYNTHESIS_SAMPLE_RATE
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(SYNTHESIS_SAMPLE_RATE))
                .config();
            return Ok((config, sample_format));
        }

        // Fallback: use default config
        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        let config = supported_config.config();
        Ok((config, sample_format))
    }

    /// Start audio playback with callback.
    ///
    /// # Arguments
    /// - `callback`: Closure called by the audio thread to fetch one mono
    ///   frame per device frame. Returns silence (0.0) when nothing is
    ///   scheduled.
    ///
    /// # Notes
    /// - Callback runs on a real-time audio thread (avoid blocking operations)
    /// - Volume control is applied automatically in the audio callback
    /// - The mono frame is duplicated across all device channels
    pub fn start<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut() -> f32 + Send + 'static,
    {
        info!("Starting audio stream");

        let volume = Arc::clone(&self.volume);
        let callback = Arc::new(Mutex::new(callback));

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(callback, volume)?,
            SampleFormat::I16 => self.build_stream_i16(callback, volume)?,
            SampleFormat::U16 => self.build_stream_u16(callback, volume)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    fn build_stream_f32(
        &self,
        callback: Arc<Mutex<dyn FnMut() -> f32 + Send + 'static>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut callback = callback.lock().unwrap();
                    let current_volume = *volume.lock().unwrap();

                    for frame in data.chunks_mut(channels) {
                        let sample = (callback() * current_volume).clamp(-1.0, 1.0);
                        for slot in frame.iter_mut() {
                            *slot = sample;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None, // No timeout
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_i16(
        &self,
        callback: Arc<Mutex<dyn FnMut() -> f32 + Send + 'static>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut callback = callback.lock().unwrap();
                    let current_volume = *volume.lock().unwrap();

                    for frame in data.chunks_mut(channels) {
                        let sample = (callback() * current_volume).clamp(-1.0, 1.0);
                        let converted = (sample * i16::MAX as f32) as i16;
                        for slot in frame.iter_mut() {
                            *slot = converted;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_u16(
        &self,
        callback: Arc<Mutex<dyn FnMut() -> f32 + Send + 'static>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    let mut callback = callback.lock().unwrap();
                    let current_volume = *volume.lock().unwrap();

                    for frame in data.chunks_mut(channels) {
                        let sample = (callback() * current_volume).clamp(-1.0, 1.0);
                        // Convert from [-1.0, 1.0] to [0, 65535]
                        let converted = ((sample + 1.0) * 32767.5) as u16;
                        for slot in frame.iter_mut() {
                            *slot = converted;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Stop audio playback.
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping audio stream");

        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
            drop(stream);
        }

        Ok(())
    }

    /// Get device name.
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Get sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Get channel count.
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Check if an audio stream error has occurred.
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.stop();
    }
}

/// Callback-side pull state: renders scheduler frames at the synthesis rate
/// and resamples them to the device rate on demand.
struct SinkPuller {
    scheduler: Arc<PlaybackScheduler>,
    resampler: StreamResampler,
    source_chunk: Vec<f32>,
    queue: VecDeque<f32>,
}

impl SinkPuller {
    fn new(scheduler: Arc<PlaybackScheduler>, device_rate: u32) -> Result<Self> {
        let resampler = StreamResampler::new(SYNTHESIS_SAMPLE_RATE, device_rate)?;
        let chunk_frames = resampler.chunk_frames();
        Ok(Self {
            scheduler,
            resampler,
            source_chunk: vec![0.0; chunk_frames],
            queue: VecDeque::with_capacity(chunk_frames * 2),
        })
    }

    fn next_frame(&mut self) -> f32 {
        let mut refills = 0;
        while self.queue.is_empty() {
            // Guard against a resampler that yields nothing: emit silence
            // rather than spinning on the audio thread
            if refills >= 4 {
                return 0.0;
            }
            refills += 1;

            self.scheduler.render(&mut self.source_chunk);
            match self.resampler.process(&self.source_chunk) {
                Ok(resampled) => self.queue.extend(resampled),
                Err(_) => return 0.0,
            }
        }
        self.queue.pop_front().unwrap_or(0.0)
    }
}

/// Spawn the device output thread for one session.
///
/// The thread owns the cpal stream (not `Send`) and keeps it alive until the
/// shutdown signal fires or the session clock closes. The returned receiver
/// resolves once the device is open and the stream started, or with the
/// open/start error; a session must not be considered started until then.
pub fn spawn_device_sink(
    device_name: Option<String>,
    volume: Arc<Mutex<f32>>,
    scheduler: Arc<PlaybackScheduler>,
    shutdown: watch::Receiver<bool>,
) -> oneshot::Receiver<Result<()>> {
    let (ready_tx, ready_rx) = oneshot::channel();

    std::thread::spawn(move || {
        let mut output = match AudioOutput::new_with_volume(device_name, volume) {
            Ok(output) => output,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let puller = match SinkPuller::new(Arc::clone(&scheduler), output.sample_rate()) {
            Ok(puller) => puller,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let mut puller = puller;
        if let Err(e) = output.start(move || puller.next_frame()) {
            let _ = ready_tx.send(Err(e));
            return;
        }

        info!(
            device = %output.device_name(),
            sample_rate = output.sample_rate(),
            channels = output.channels(),
            "Device sink started"
        );
        let _ = ready_tx.send(Ok(()));

        // Keep the stream alive until the session ends
        loop {
            std::thread::sleep(Duration::from_millis(200));
            if *shutdown.borrow() || !scheduler.is_alive() {
                break;
            }
            if output.has_error() {
                warn!("Audio stream flagged an error; shutting down sink");
                break;
            }
        }

        let _ = output.stop();
        debug!("Device sink thread exited");
    });

    ready_rx
}

/// Spawn a null sink that drives the session clock at real-time pace.
///
/// Used for headless operation and tests: rendering advances the clock and
/// fires completion events exactly as a device would, without hardware.
pub fn spawn_null_sink(
    scheduler: Arc<PlaybackScheduler>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(10));
        // 10ms of frames at the synthesis rate per tick
        let mut scratch = vec![0.0f32; (SYNTHESIS_SAMPLE_RATE / 100) as usize];

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !scheduler.is_alive() {
                        break;
                    }
                    scheduler.render(&mut scratch);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Null sink task exited");
    })
}
