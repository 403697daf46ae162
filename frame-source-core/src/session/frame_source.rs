use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{CaptureDiagnostics, FrameLevels, ReadStatus};
use crate::models::config::{CaptureConfiguration, FrameSourceOptions};
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::session::audio_mode_guard::AudioModeGuard;
use crate::session::echo_canceler_slot::EchoCancelerSlot;
use crate::traits::device_context::{DeviceContext, PlatformServices};
use crate::traits::microphone::CaptureDevice;

/// Session state shared with `FrameSourceStopper`, protected by
/// `parking_lot::Mutex`. Never held across a blocking read.
struct SharedSession {
    state: CaptureState,
    device: Option<Arc<dyn CaptureDevice>>,
    mode_guard: Option<AudioModeGuard>,
}

/// Pull-based microphone frame source.
///
/// Lifecycle: `start` → repeated `frame` → `stop` → `release`.
/// `frame` takes `&mut self` and returns a slice of the internal frame
/// buffer, which the next call overwrites. Use `stopper` to stop capture
/// from another thread while `frame` is blocked.
///
/// ```text
/// [DeviceContext] → permission ✓ → [AudioModeGuard] → [CaptureDevice] → frame buffer
///                                                  └→ [EchoCancelerSlot]
/// ```
pub struct FrameSource {
    options: FrameSourceOptions,
    shared: Arc<Mutex<SharedSession>>,
    config: Option<CaptureConfiguration>,
    services: Option<PlatformServices>,
    echo_canceler: EchoCancelerSlot,
    buffer: Vec<i16>,
    diagnostics: CaptureDiagnostics,
    levels: Option<FrameLevels>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::with_options(FrameSourceOptions::default())
    }

    pub fn with_options(options: FrameSourceOptions) -> Self {
        Self {
            options,
            shared: Arc::new(Mutex::new(SharedSession {
                state: CaptureState::Created,
                device: None,
                mode_guard: None,
            })),
            config: None,
            services: None,
            echo_canceler: EchoCancelerSlot::new(),
            buffer: Vec::new(),
            diagnostics: CaptureDiagnostics::default(),
            levels: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.shared.lock().state
    }

    pub fn options(&self) -> &FrameSourceOptions {
        &self.options
    }

    /// Parameters of the current session, once started.
    pub fn configuration(&self) -> Option<&CaptureConfiguration> {
        self.config.as_ref()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics.clone()
    }

    /// RMS and peak of the last complete frame.
    pub fn levels(&self) -> Option<FrameLevels> {
        self.levels
    }

    pub fn echo_canceler_attached(&self) -> bool {
        self.echo_canceler.is_attached()
    }

    /// A handle that can stop capture from any thread.
    pub fn stopper(&self) -> FrameSourceStopper {
        FrameSourceStopper {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open the microphone and begin capturing.
    ///
    /// Fails with `PermissionDenied` before touching any platform service
    /// when microphone access is not granted. A stopped session may be
    /// started again with the same parameters.
    pub fn start(
        &mut self,
        sample_rate_hz: u32,
        frame_size: usize,
        context: &dyn DeviceContext,
    ) -> Result<(), CaptureError> {
        let config = CaptureConfiguration::new(sample_rate_hz, frame_size);
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        match self.state() {
            CaptureState::Created => {}
            CaptureState::Stopped => return self.restart(config),
            CaptureState::Started => {
                return Err(CaptureError::ConfigurationFailed(
                    "capture already started".into(),
                ))
            }
            CaptureState::Released => {
                return Err(CaptureError::ConfigurationFailed(
                    "frame source has been released".into(),
                ))
            }
        }

        if !context.microphone_permission().is_granted() {
            log::warn!("Microphone permission not granted; capture not started");
            return Err(CaptureError::PermissionDenied);
        }

        let services = context.services(self.options.service_lookup)?;

        // Dropped on any failure below, which restores the previous mode.
        let mode_guard = AudioModeGuard::enter(
            Arc::clone(&services.audio_mode),
            self.options.capture_mode,
            self.options.restore_audio_mode,
        )?;

        let format = config.format();
        // Never smaller than one frame, or a full frame could not be buffered.
        let buffer_size = services.microphone.min_buffer_size(&format)?.max(frame_size);
        let device: Arc<dyn CaptureDevice> =
            Arc::from(services.microphone.open(&format, buffer_size)?);

        self.attach_echo_canceler(&services, device.as_ref());

        if let Err(e) = device.start_recording() {
            if let Err(release_error) = self.echo_canceler.release() {
                log::warn!("Failed to release echo canceller: {}", release_error);
            }
            if let Err(release_error) = device.release() {
                log::warn!("Failed to release capture device: {}", release_error);
            }
            return Err(e);
        }

        self.buffer = vec![0; frame_size];
        self.diagnostics.internal_buffer_samples = buffer_size;
        self.diagnostics.echo_canceler_attached = self.echo_canceler.is_attached();
        self.config = Some(config);
        self.services = Some(services);

        {
            let mut session = self.shared.lock();
            session.device = Some(device);
            session.mode_guard = Some(mode_guard);
            session.state = CaptureState::Started;
        }

        log::info!(
            "Frame source started: {} Hz, {} samples/frame, internal buffer {} samples",
            sample_rate_hz,
            frame_size,
            buffer_size
        );
        Ok(())
    }

    /// Block until a full frame has been captured.
    ///
    /// The returned slice is overwritten by the next call. Returns
    /// `NotStarted` without blocking unless the session is started.
    pub fn frame(&mut self) -> Result<&[i16], CaptureError> {
        let device = {
            let session = self.shared.lock();
            if !session.state.can_read() {
                return Err(CaptureError::NotStarted);
            }
            session.device.clone().ok_or(CaptureError::NotStarted)?
        };

        let outcome = device.read(&mut self.buffer, self.options.frame_timeout());
        let captured = outcome.samples;

        let dropped = device.overruns();
        if dropped > self.diagnostics.dropped_samples {
            log::warn!(
                "Capture buffer overflowed: {} samples dropped",
                dropped - self.diagnostics.dropped_samples
            );
            self.diagnostics.dropped_samples = dropped;
        }

        match outcome.status {
            ReadStatus::Complete => {
                self.diagnostics.frames_delivered += 1;
                self.diagnostics.samples_delivered += captured as u64;
                self.levels = Some(FrameLevels::measure(&self.buffer));
                Ok(&self.buffer)
            }
            ReadStatus::Stopped => {
                self.diagnostics.interrupted_reads += 1;
                log::debug!("Frame read interrupted after {} samples", captured);
                Err(CaptureError::Interrupted {
                    partial: self.buffer[..captured].to_vec(),
                })
            }
            ReadStatus::Closed => {
                log::info!("Capture device closed after {} samples", captured);
                Err(CaptureError::EndOfStream {
                    partial: self.buffer[..captured].to_vec(),
                })
            }
            ReadStatus::TimedOut => {
                self.diagnostics.timed_out_reads += 1;
                Err(CaptureError::Timeout {
                    partial: self.buffer[..captured].to_vec(),
                })
            }
        }
    }

    /// Halt capture. Idempotent once stopped.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        stop_session(&self.shared)
    }

    /// Release the device and the echo canceller. Idempotent.
    pub fn release(&mut self) -> Result<(), CaptureError> {
        let (was_started, device, mode_guard) = {
            let mut session = self.shared.lock();
            if session.state == CaptureState::Released {
                return Ok(());
            }
            let was_started = session.state == CaptureState::Started;
            session.state = CaptureState::Released;
            (was_started, session.device.take(), session.mode_guard.take())
        };

        let mut first_error = None;
        let mut record = |result: Result<(), CaptureError>| {
            if let Err(e) = result {
                log::warn!("Error while releasing frame source: {}", e);
                first_error.get_or_insert(e);
            }
        };

        record(self.echo_canceler.release());
        if let Some(device) = device {
            if was_started {
                record(device.stop());
            }
            record(device.release());
        }
        if let Some(guard) = mode_guard {
            record(guard.release());
        }

        self.buffer = Vec::new();
        self.services = None;
        self.diagnostics.echo_canceler_attached = false;
        log::info!("Frame source released");

        first_error.map_or(Ok(()), Err)
    }

    /// Started → Stopped → Started with unchanged parameters. The device and
    /// echo canceller from the first start are reused.
    fn restart(&mut self, config: CaptureConfiguration) -> Result<(), CaptureError> {
        if self.config != Some(config) {
            return Err(CaptureError::ConfigurationFailed(
                "release the frame source before changing capture parameters".into(),
            ));
        }
        let services = self
            .services
            .clone()
            .ok_or(CaptureError::NotStarted)?;

        let mode_guard = AudioModeGuard::enter(
            Arc::clone(&services.audio_mode),
            self.options.capture_mode,
            self.options.restore_audio_mode,
        )?;

        let device = self
            .shared
            .lock()
            .device
            .clone()
            .ok_or(CaptureError::DeviceUnavailable)?;

        self.attach_echo_canceler(&services, device.as_ref());
        device.start_recording()?;
        self.diagnostics.echo_canceler_attached = self.echo_canceler.is_attached();

        let mut session = self.shared.lock();
        session.mode_guard = Some(mode_guard);
        session.state = CaptureState::Started;
        log::info!("Frame source restarted");
        Ok(())
    }

    /// Missing or failing echo cancellation never blocks capture.
    fn attach_echo_canceler(&mut self, services: &PlatformServices, device: &dyn CaptureDevice) {
        if !self.options.echo_cancellation {
            return;
        }
        let Some(service) = services.echo_canceler.as_deref() else {
            log::debug!("Platform offers no echo canceller");
            return;
        };
        if let Err(e) = self.echo_canceler.attach(service, device.session_id()) {
            log::warn!("Echo canceller could not be attached: {}", e);
        }
    }
}

impl Default for FrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if self.state() == CaptureState::Created {
            return;
        }
        if let Err(e) = self.release() {
            log::warn!("Frame source release on drop failed: {}", e);
        }
    }
}

/// Cloneable handle that stops a `FrameSource` from another thread.
///
/// A `frame()` call blocked on the device returns `Interrupted` promptly.
#[derive(Clone)]
pub struct FrameSourceStopper {
    shared: Arc<Mutex<SharedSession>>,
}

impl FrameSourceStopper {
    pub fn stop(&self) -> Result<(), CaptureError> {
        stop_session(&self.shared)
    }
}

fn stop_session(shared: &Mutex<SharedSession>) -> Result<(), CaptureError> {
    let mut session = shared.lock();
    match session.state {
        CaptureState::Created => Err(CaptureError::NotStarted),
        CaptureState::Stopped | CaptureState::Released => Ok(()),
        CaptureState::Started => {
            session.state = CaptureState::Stopped;
            let result = match session.device.as_ref() {
                Some(device) => device.stop(),
                None => Ok(()),
            };
            if let Some(guard) = session.mode_guard.take() {
                if let Err(e) = guard.release() {
                    log::warn!("Failed to restore audio mode on stop: {}", e);
                }
            }
            log::info!("Frame source stopped");
            result
        }
    }
}
