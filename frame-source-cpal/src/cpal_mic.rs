//! cpal microphone service and capture device.
//!
//! Note: `cpal::Stream` is not `Send`, so each open device owns a dedicated
//! thread that builds the stream and obeys play/pause/close commands. The
//! stream callback converts device audio to mono `i16` at the requested
//! rate and pushes it into the device's `SampleQueue`, where `read` blocks.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use frame_source_core::{
    AudioSessionId, CaptureDevice, CaptureError, CaptureFormat, MicrophoneService, PcmConverter,
    ReadOutcome, SampleQueue,
};

use crate::error::BackendError;

/// Requestable capture rates.
pub const SUPPORTED_SAMPLE_RATES: RangeInclusive<u32> = 4_000..=192_000;

/// Lower bound on the internal buffer, in milliseconds of audio.
const MIN_BUFFER_MS: u64 = 40;

/// Requested callback period when the device reports a supported range.
const PERIOD_MS: u32 = 10;

/// Assumed worst-case callback when the host picks the period itself.
const UNKNOWN_PERIOD_MS: u32 = 500;

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

/// Microphone service for the default input device of one cpal host.
#[derive(Debug, Clone, Copy)]
pub struct CpalMicrophone {
    host_id: cpal::HostId,
}

impl CpalMicrophone {
    pub fn new(host_id: cpal::HostId) -> Self {
        Self { host_id }
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host_id
    }
}

impl MicrophoneService for CpalMicrophone {
    fn min_buffer_size(&self, format: &CaptureFormat) -> Result<usize, CaptureError> {
        check_sample_rate(format.sample_rate_hz)?;
        let device = default_input_device(self.host_id)?;
        let plan = StreamPlan::choose(&device, format.sample_rate_hz)?;
        Ok(min_buffer_samples(
            plan.period_frames,
            plan.config.sample_rate.0,
            format.sample_rate_hz,
        ))
    }

    fn open(
        &self,
        format: &CaptureFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        check_sample_rate(format.sample_rate_hz)?;
        let device = CpalCaptureDevice::open(self.host_id, format.sample_rate_hz, buffer_size)?;
        Ok(Box::new(device))
    }
}

fn check_sample_rate(sample_rate_hz: u32) -> Result<(), BackendError> {
    if SUPPORTED_SAMPLE_RATES.contains(&sample_rate_hz) {
        Ok(())
    } else {
        Err(BackendError::UnsupportedRate(sample_rate_hz))
    }
}

fn default_input_device(host_id: cpal::HostId) -> Result<cpal::Device, BackendError> {
    let host = cpal::host_from_id(host_id)?;
    host.default_input_device()
        .ok_or_else(|| BackendError::NoInputDevice(host_id.name().to_string()))
}

/// `frames` at `from_rate` expressed in samples at `to_rate`, rounded up.
fn frames_at_rate(frames: u32, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    (frames as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize
}

/// Internal buffer size in target-rate samples: the device's callback
/// period converted to the requested rate, never below `MIN_BUFFER_MS`.
fn min_buffer_samples(period_frames: Option<u32>, device_rate: u32, target_rate: u32) -> usize {
    let floor = (target_rate as u64 * MIN_BUFFER_MS / 1000) as usize;
    let device_min = period_frames
        .map(|frames| frames_at_rate(frames, device_rate, target_rate))
        .unwrap_or(0);
    device_min.max(floor).max(1)
}

/// Queue capacity that absorbs one whole callback on top of `buffer_size`,
/// so a reader that is already waiting never loses samples to overflow.
fn queue_capacity(
    buffer_size: usize,
    period_frames: Option<u32>,
    device_rate: u32,
    target_rate: u32,
) -> usize {
    let callback_frames = period_frames.unwrap_or(device_rate * UNKNOWN_PERIOD_MS / 1000);
    // +1 for the interpolation phase straddling a callback boundary.
    buffer_size + frames_at_rate(callback_frames, device_rate, target_rate) + 1
}

/// Fixed callback period for a supported buffer range: `PERIOD_MS` of audio,
/// clamped to what the device accepts.
fn period_for_range(min: u32, max: u32, device_rate: u32) -> u32 {
    (device_rate * PERIOD_MS / 1000).clamp(min, max.max(min))
}

/// Stream configuration chosen for a requested rate.
///
/// Prefers a mono `i16` config that runs at the requested rate natively;
/// otherwise falls back to the device default and converts in the callback.
/// When the device reports its buffer range the period is fixed, so the
/// callback size is known up front.
#[derive(Debug, Clone)]
struct StreamPlan {
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    period_frames: Option<u32>,
}

impl StreamPlan {
    fn choose(device: &cpal::Device, sample_rate_hz: u32) -> Result<Self, BackendError> {
        let requested = cpal::SampleRate(sample_rate_hz);

        let mut candidates: Vec<cpal::SupportedStreamConfigRange> = device
            .supported_input_configs()?
            .filter(|range| range.min_sample_rate() <= requested && requested <= range.max_sample_rate())
            .collect();
        candidates.sort_by_key(|range| {
            (
                range.channels() != 1,
                range.sample_format() != cpal::SampleFormat::I16,
            )
        });

        let supported = match candidates.into_iter().next() {
            Some(range) => range.with_sample_rate(requested),
            None => device.default_input_config()?,
        };

        let device_rate = supported.sample_rate().0;
        let period_frames = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => {
                Some(period_for_range(*min, *max, device_rate))
            }
            cpal::SupportedBufferSize::Unknown => None,
        };

        let mut config = supported.config();
        if let Some(frames) = period_frames {
            config.buffer_size = cpal::BufferSize::Fixed(frames);
        }

        Ok(Self {
            config,
            sample_format: supported.sample_format(),
            period_frames,
        })
    }

    /// The same stream with the host's default period.
    fn with_default_period(mut self) -> Self {
        self.config.buffer_size = cpal::BufferSize::Default;
        self.period_frames = None;
        self
    }
}

/// Commands sent to the stream thread.
enum StreamCommand {
    Play(mpsc::SyncSender<Result<(), BackendError>>),
    Pause(mpsc::SyncSender<Result<(), BackendError>>),
    Close,
}

/// An open cpal input stream feeding a `SampleQueue`.
pub struct CpalCaptureDevice {
    session_id: AudioSessionId,
    queue: Arc<SampleQueue>,
    commands: Mutex<Option<mpsc::Sender<StreamCommand>>>,
    stream_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalCaptureDevice {
    /// Spawn the stream thread and wait until the stream is built.
    fn open(
        host_id: cpal::HostId,
        sample_rate_hz: u32,
        buffer_size: usize,
    ) -> Result<Self, BackendError> {
        let plan = StreamPlan::choose(&default_input_device(host_id)?, sample_rate_hz)?;
        let device_rate = plan.config.sample_rate.0;
        let capacity = queue_capacity(buffer_size, plan.period_frames, device_rate, sample_rate_hz);

        let queue = Arc::new(SampleQueue::new(capacity));
        let (cmd_tx, cmd_rx) = mpsc::channel::<StreamCommand>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), BackendError>>(1);

        let thread_queue = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || {
                let built =
                    build_input_stream(host_id, sample_rate_hz, plan, buffer_size, thread_queue);
                let stream = match built {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                stream_command_loop(stream, cmd_rx);
            })
            .map_err(|e| BackendError::Thread(format!("failed to spawn mic thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(BackendError::Thread("capture thread exited during setup".into()));
            }
        }

        let session_id = AudioSessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst));
        log::info!(
            "Opened cpal capture device on {} ({} Hz, queue {} samples, {})",
            host_id.name(),
            sample_rate_hz,
            queue.capacity(),
            session_id
        );

        Ok(Self {
            session_id,
            queue,
            commands: Mutex::new(Some(cmd_tx)),
            stream_handle: Mutex::new(Some(handle)),
        })
    }

    fn send(
        &self,
        command: impl FnOnce(mpsc::SyncSender<Result<(), BackendError>>) -> StreamCommand,
    ) -> Result<(), BackendError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        {
            let commands = self.commands.lock();
            let sender = commands
                .as_ref()
                .ok_or_else(|| BackendError::Thread("device released".into()))?;
            sender
                .send(command(reply_tx))
                .map_err(|_| BackendError::Thread("capture thread is gone".into()))?;
        }
        reply_rx
            .recv()
            .map_err(|_| BackendError::Thread("capture thread did not reply".into()))?
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn session_id(&self) -> AudioSessionId {
        self.session_id
    }

    fn start_recording(&self) -> Result<(), CaptureError> {
        if !self.queue.start() {
            return Err(CaptureError::DeviceFault("device released".into()));
        }
        if let Err(e) = self.send(StreamCommand::Play) {
            self.queue.stop();
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&self, out: &mut [i16], timeout: Option<Duration>) -> ReadOutcome {
        self.queue.read(out, timeout)
    }

    fn stop(&self) -> Result<(), CaptureError> {
        // Unblock readers first; pausing the hardware can take a while.
        self.queue.stop();
        if self.queue.is_closed() {
            return Ok(());
        }
        self.send(StreamCommand::Pause).map_err(CaptureError::from)
    }

    fn overruns(&self) -> u64 {
        self.queue.overruns()
    }

    fn release(&self) -> Result<(), CaptureError> {
        self.queue.close();
        if let Some(sender) = self.commands.lock().take() {
            let _ = sender.send(StreamCommand::Close);
        }
        if let Some(handle) = self.stream_handle.lock().take() {
            let _ = handle.join();
            log::debug!("Released cpal capture device {}", self.session_id);
        }
        Ok(())
    }
}

impl Drop for CpalCaptureDevice {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn stream_command_loop(stream: cpal::Stream, commands: mpsc::Receiver<StreamCommand>) {
    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Play(reply) => {
                let _ = reply.send(stream.play().map_err(BackendError::from));
            }
            StreamCommand::Pause(reply) => {
                let _ = reply.send(stream.pause().map_err(BackendError::from));
            }
            StreamCommand::Close => break,
        }
    }
    drop(stream);
    log::debug!("cpal capture thread stopped");
}

fn build_input_stream(
    host_id: cpal::HostId,
    sample_rate_hz: u32,
    plan: StreamPlan,
    buffer_size: usize,
    queue: Arc<SampleQueue>,
) -> Result<cpal::Stream, BackendError> {
    let device = default_input_device(host_id)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    log::debug!(
        "Input device {}: {} Hz, {} channel(s), format {:?}, period {:?}, requested {} Hz",
        device_name,
        plan.config.sample_rate.0,
        plan.config.channels,
        plan.sample_format,
        plan.config.buffer_size,
        sample_rate_hz
    );

    match build_planned_stream(&device, &plan, sample_rate_hz, Arc::clone(&queue)) {
        Err(BackendError::BuildStream(cpal::BuildStreamError::StreamConfigNotSupported))
            if plan.period_frames.is_some() =>
        {
            log::warn!(
                "Input device {} rejected a fixed period; using the host default",
                device_name
            );
            let plan = plan.with_default_period();
            queue.reserve(queue_capacity(
                buffer_size,
                None,
                plan.config.sample_rate.0,
                sample_rate_hz,
            ));
            build_planned_stream(&device, &plan, sample_rate_hz, queue)
        }
        result => result,
    }
}

fn build_planned_stream(
    device: &cpal::Device,
    plan: &StreamPlan,
    sample_rate_hz: u32,
    queue: Arc<SampleQueue>,
) -> Result<cpal::Stream, BackendError> {
    let sink = CaptureSink::new(queue, sample_rate_hz, &plan.config);
    match plan.sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &plan.config, sink),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &plan.config, sink),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &plan.config, sink),
        format => Err(BackendError::UnsupportedFormat(format!("{:?}", format))),
    }
}

/// Callback-side state: converts each device chunk and queues the result.
struct CaptureSink {
    queue: Arc<SampleQueue>,
    converter: PcmConverter,
    source_rate: u32,
    source_channels: usize,
}

impl CaptureSink {
    fn new(queue: Arc<SampleQueue>, target_rate: u32, config: &cpal::StreamConfig) -> Self {
        Self {
            queue,
            converter: PcmConverter::new(target_rate),
            source_rate: config.sample_rate.0,
            source_channels: config.channels as usize,
        }
    }

    fn accept(&mut self, samples: &[f32]) {
        let pcm = self
            .converter
            .convert(samples, self.source_rate, self.source_channels);
        self.queue.push(&pcm);
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut sink: CaptureSink,
) -> Result<cpal::Stream, BackendError>
where
    T: cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let error_queue = Arc::clone(&sink.queue);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data
                .iter()
                .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                .collect();
            sink.accept(&samples);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                error_queue.close();
            }
        },
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_outside_supported_range_are_rejected() {
        assert!(check_sample_rate(8_000).is_ok());
        assert!(check_sample_rate(192_000).is_ok());
        assert!(matches!(
            check_sample_rate(0),
            Err(BackendError::UnsupportedRate(0))
        ));
        assert!(check_sample_rate(384_000).is_err());
    }

    #[test]
    fn unknown_device_period_falls_back_to_floor() {
        // 40 ms at 8 kHz
        assert_eq!(min_buffer_samples(None, 48_000, 8_000), 320);
    }

    #[test]
    fn large_device_period_is_scaled_to_target_rate() {
        // 4800 frames at 48 kHz = 100 ms = 800 samples at 8 kHz
        assert_eq!(min_buffer_samples(Some(4_800), 48_000, 8_000), 800);
    }

    #[test]
    fn small_device_period_is_raised_to_floor() {
        assert_eq!(min_buffer_samples(Some(64), 16_000, 16_000), 640);
    }

    #[test]
    fn fixed_period_is_clamped_to_device_range() {
        assert_eq!(period_for_range(64, 8_192, 48_000), 480);
        assert_eq!(period_for_range(1_024, 8_192, 48_000), 1_024);
        assert_eq!(period_for_range(16, 256, 48_000), 256);
    }

    #[test]
    fn queue_absorbs_a_whole_host_default_callback() {
        let buffer = min_buffer_samples(None, 44_100, 8_000).max(160);
        let capacity = queue_capacity(buffer, None, 44_100, 8_000);

        // A 4096-frame callback at 44.1 kHz is 743 samples at 8 kHz.
        assert!(capacity >= buffer + 743);
    }

    fn stereo_config(rate: u32) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(rate),
            buffer_size: cpal::BufferSize::Fixed(4_096),
        }
    }

    #[test]
    fn sink_delivers_a_second_of_audio_without_loss() {
        let frame_size = 160;
        let buffer = min_buffer_samples(Some(4_096), 44_100, 8_000).max(frame_size);
        let queue = Arc::new(SampleQueue::new(queue_capacity(
            buffer,
            Some(4_096),
            44_100,
            8_000,
        )));
        queue.start();
        let mut sink = CaptureSink::new(Arc::clone(&queue), 8_000, &stereo_config(44_100));

        let mut delivered = Vec::new();
        let mut frame = vec![0i16; frame_size];
        let mut position = 0usize;
        while position < 44_100 {
            let frames = 4_096.min(44_100 - position);
            let chunk: Vec<f32> = (position..position + frames)
                .flat_map(|i| {
                    let value = (i % 1_000) as f32 / 2_000.0;
                    [value, value]
                })
                .collect();
            sink.accept(&chunk);
            position += frames;

            while queue.available() >= frame_size {
                let outcome = queue.read(&mut frame, Some(Duration::ZERO));
                assert!(outcome.is_complete());
                delivered.extend_from_slice(&frame);
            }
        }
        delivered.extend(std::iter::repeat(0).take(queue.available()));

        assert_eq!(queue.overruns(), 0);
        assert!(
            (7_999..=8_001).contains(&delivered.len()),
            "delivered {} samples for 1 s at 8000 Hz",
            delivered.len()
        );
    }
}
