//! In-process simulated platform.
//!
//! Stands in for real audio hardware in tests: samples are pushed by the
//! test through `SimulatedInput`, and every platform interaction is counted
//! so tests can assert on side effects (mode switches, opens, echo canceller
//! creations).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{
    AudioMode, AudioSessionId, CaptureFormat, PermissionStatus, ReadOutcome,
};
use crate::models::config::ServiceLookup;
use crate::models::error::CaptureError;
use crate::processing::sample_queue::SampleQueue;
use crate::traits::audio_mode::AudioModeService;
use crate::traits::device_context::{DeviceContext, PlatformServices};
use crate::traits::echo_canceler::{EchoCanceler, EchoCancelerService};
use crate::traits::microphone::{CaptureDevice, MicrophoneService};

/// Ascending sample ramp, handy for checking chronological order.
pub fn ramp(start: i16, len: usize) -> Vec<i16> {
    (0..len).map(|i| start.wrapping_add(i as i16)).collect()
}

/// A `DeviceContext` backed entirely by in-memory doubles.
#[derive(Clone)]
pub struct SimulatedContext {
    permission: Arc<Mutex<PermissionStatus>>,
    lookups: Arc<Mutex<Vec<ServiceLookup>>>,
    audio_mode: Arc<SimulatedAudioMode>,
    microphone: Arc<SimulatedMicrophone>,
    echo_canceler: Option<Arc<SimulatedEchoCanceler>>,
}

impl SimulatedContext {
    /// Permission granted, echo canceller available.
    pub fn new() -> Self {
        Self::build(Some(Arc::new(SimulatedEchoCanceler::new(true))))
    }

    /// A platform with no echo cancellation effect at all.
    pub fn without_echo_canceler() -> Self {
        Self::build(None)
    }

    /// A platform whose echo canceller service reports itself unavailable.
    pub fn with_unavailable_echo_canceler() -> Self {
        Self::build(Some(Arc::new(SimulatedEchoCanceler::new(false))))
    }

    fn build(echo_canceler: Option<Arc<SimulatedEchoCanceler>>) -> Self {
        Self {
            permission: Arc::new(Mutex::new(PermissionStatus::Granted)),
            lookups: Arc::new(Mutex::new(Vec::new())),
            audio_mode: Arc::new(SimulatedAudioMode::new(AudioMode::Normal)),
            microphone: Arc::new(SimulatedMicrophone::new()),
            echo_canceler,
        }
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        *self.permission.lock() = status;
    }

    /// Strategies passed to `services`, in call order.
    pub fn lookups(&self) -> Vec<ServiceLookup> {
        self.lookups.lock().clone()
    }

    pub fn audio_mode(&self) -> &SimulatedAudioMode {
        &self.audio_mode
    }

    pub fn microphone(&self) -> &SimulatedMicrophone {
        &self.microphone
    }

    pub fn echo_canceler(&self) -> Option<&SimulatedEchoCanceler> {
        self.echo_canceler.as_deref()
    }

    /// Producer handle for the simulated microphone.
    pub fn input(&self) -> SimulatedInput {
        SimulatedInput {
            microphone: Arc::clone(&self.microphone),
        }
    }
}

impl Default for SimulatedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceContext for SimulatedContext {
    fn microphone_permission(&self) -> PermissionStatus {
        *self.permission.lock()
    }

    fn services(&self, lookup: ServiceLookup) -> Result<PlatformServices, CaptureError> {
        self.lookups.lock().push(lookup);
        Ok(PlatformServices {
            audio_mode: self.audio_mode.clone(),
            microphone: self.microphone.clone(),
            echo_canceler: self
                .echo_canceler
                .clone()
                .map(|service| service as Arc<dyn EchoCancelerService>),
        })
    }
}

/// In-memory process-wide audio mode.
pub struct SimulatedAudioMode {
    mode: Mutex<AudioMode>,
    changes: AtomicUsize,
}

impl SimulatedAudioMode {
    pub fn new(mode: AudioMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            changes: AtomicUsize::new(0),
        }
    }

    /// Number of `set_mode` calls so far.
    pub fn changes(&self) -> usize {
        self.changes.load(Ordering::SeqCst)
    }
}

impl AudioModeService for SimulatedAudioMode {
    fn mode(&self) -> AudioMode {
        *self.mode.lock()
    }

    fn set_mode(&self, mode: AudioMode) -> Result<(), CaptureError> {
        *self.mode.lock() = mode;
        self.changes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Simulated microphone service. Each `open` creates a fresh device whose
/// samples come from `SimulatedInput`.
pub struct SimulatedMicrophone {
    min_buffer_size: Mutex<Option<usize>>,
    fail_open: Mutex<Option<CaptureError>>,
    fail_start: Arc<Mutex<Option<CaptureError>>>,
    opens: AtomicUsize,
    min_buffer_queries: AtomicUsize,
    device_releases: Arc<AtomicUsize>,
    next_session: AtomicU32,
    current: Mutex<Option<Arc<SampleQueue>>>,
    pending: Arc<Mutex<Vec<i16>>>,
}

impl SimulatedMicrophone {
    fn new() -> Self {
        Self {
            min_buffer_size: Mutex::new(None),
            fail_open: Mutex::new(None),
            fail_start: Arc::new(Mutex::new(None)),
            opens: AtomicUsize::new(0),
            min_buffer_queries: AtomicUsize::new(0),
            device_releases: Arc::new(AtomicUsize::new(0)),
            next_session: AtomicU32::new(1),
            current: Mutex::new(None),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Override the reported minimum buffer size. By default one second of
    /// audio at the requested rate.
    pub fn set_min_buffer_size(&self, samples: Option<usize>) {
        *self.min_buffer_size.lock() = samples;
    }

    /// Make the next `open` calls fail with `error`.
    pub fn fail_open(&self, error: Option<CaptureError>) {
        *self.fail_open.lock() = error;
    }

    /// Make `start_recording` on any device fail with `error`.
    pub fn fail_start(&self, error: Option<CaptureError>) {
        *self.fail_start.lock() = error;
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn min_buffer_queries(&self) -> usize {
        self.min_buffer_queries.load(Ordering::SeqCst)
    }

    pub fn device_releases(&self) -> usize {
        self.device_releases.load(Ordering::SeqCst)
    }

    /// Internal buffer capacity of the most recently opened device.
    pub fn current_capacity(&self) -> Option<usize> {
        self.current.lock().as_ref().map(|queue| queue.capacity())
    }
}

impl MicrophoneService for SimulatedMicrophone {
    fn min_buffer_size(&self, format: &CaptureFormat) -> Result<usize, CaptureError> {
        self.min_buffer_queries.fetch_add(1, Ordering::SeqCst);
        let configured = *self.min_buffer_size.lock();
        Ok(configured.unwrap_or(format.sample_rate_hz as usize))
    }

    fn open(
        &self,
        _format: &CaptureFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        if let Some(error) = self.fail_open.lock().clone() {
            return Err(error);
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        let queue = Arc::new(SampleQueue::new(buffer_size));
        *self.current.lock() = Some(Arc::clone(&queue));

        Ok(Box::new(SimulatedDevice {
            session_id: AudioSessionId(self.next_session.fetch_add(1, Ordering::SeqCst)),
            queue,
            pending: Arc::clone(&self.pending),
            fail_start: Arc::clone(&self.fail_start),
            released: AtomicBool::new(false),
            device_releases: Arc::clone(&self.device_releases),
        }))
    }
}

struct SimulatedDevice {
    session_id: AudioSessionId,
    queue: Arc<SampleQueue>,
    pending: Arc<Mutex<Vec<i16>>>,
    fail_start: Arc<Mutex<Option<CaptureError>>>,
    released: AtomicBool,
    device_releases: Arc<AtomicUsize>,
}

impl CaptureDevice for SimulatedDevice {
    fn session_id(&self) -> AudioSessionId {
        self.session_id
    }

    fn start_recording(&self) -> Result<(), CaptureError> {
        if let Some(error) = self.fail_start.lock().clone() {
            return Err(error);
        }
        // Held across start and flush so a concurrent `SimulatedInput::push`
        // lands either before or after the pending samples.
        let mut pending = self.pending.lock();
        if !self.queue.start() {
            return Err(CaptureError::DeviceFault("device released".into()));
        }
        self.queue.push(&pending);
        pending.clear();
        Ok(())
    }

    fn read(&self, out: &mut [i16], timeout: Option<Duration>) -> ReadOutcome {
        self.queue.read(out, timeout)
    }

    fn stop(&self) -> Result<(), CaptureError> {
        self.queue.stop();
        Ok(())
    }

    fn overruns(&self) -> u64 {
        self.queue.overruns()
    }

    fn release(&self) -> Result<(), CaptureError> {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.queue.close();
            self.device_releases.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Producer side of the simulated microphone.
#[derive(Clone)]
pub struct SimulatedInput {
    microphone: Arc<SimulatedMicrophone>,
}

impl SimulatedInput {
    /// Deliver samples to the open device. Samples pushed before the device
    /// records are held and delivered when recording starts.
    pub fn push(&self, samples: &[i16]) {
        let current = self.microphone.current.lock().clone();
        let mut pending = self.microphone.pending.lock();
        let accepted = current.is_some_and(|queue| queue.push(samples));
        if !accepted {
            pending.extend_from_slice(samples);
        }
    }

    /// Close the device from the platform side, as if it was torn down
    /// externally.
    pub fn close(&self) {
        if let Some(queue) = self.microphone.current.lock().as_ref() {
            queue.close();
        }
    }
}

/// Simulated echo canceller factory that counts instances.
pub struct SimulatedEchoCanceler {
    available: bool,
    creations: AtomicUsize,
    enabled: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    sessions: Mutex<Vec<AudioSessionId>>,
}

impl SimulatedEchoCanceler {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            creations: AtomicUsize::new(0),
            enabled: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Instances created so far.
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    /// Instances currently enabled.
    pub fn enabled_instances(&self) -> usize {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Session ids effects were attached to.
    pub fn sessions(&self) -> Vec<AudioSessionId> {
        self.sessions.lock().clone()
    }
}

impl EchoCancelerService for SimulatedEchoCanceler {
    fn is_available(&self) -> bool {
        self.available
    }

    fn create(&self, session: AudioSessionId) -> Result<Option<Box<dyn EchoCanceler>>, CaptureError> {
        if !self.available {
            return Ok(None);
        }
        self.creations.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().push(session);
        Ok(Some(Box::new(SimulatedEffect {
            enabled: false,
            enabled_count: Arc::clone(&self.enabled),
            releases: Arc::clone(&self.releases),
        })))
    }
}

struct SimulatedEffect {
    enabled: bool,
    enabled_count: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl EchoCanceler for SimulatedEffect {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), CaptureError> {
        if enabled && !self.enabled {
            self.enabled_count.fetch_add(1, Ordering::SeqCst);
        } else if !enabled && self.enabled {
            self.enabled_count.fetch_sub(1, Ordering::SeqCst);
        }
        self.enabled = enabled;
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        self.set_enabled(false)?;
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_counts_up() {
        assert_eq!(ramp(10, 4), vec![10, 11, 12, 13]);
    }

    #[test]
    fn input_pushed_before_recording_is_delivered_on_start() {
        let context = SimulatedContext::new();
        let services = context.services(ServiceLookup::Direct).unwrap();
        let format = CaptureFormat::mono_pcm16(8000);

        let device = services.microphone.open(&format, 100).unwrap();
        context.input().push(&[1, 2, 3]);
        device.start_recording().unwrap();

        let mut out = [0i16; 3];
        assert!(device.read(&mut out, None).is_complete());
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn released_device_cannot_restart() {
        let context = SimulatedContext::new();
        let services = context.services(ServiceLookup::Compat).unwrap();
        let device = services
            .microphone
            .open(&CaptureFormat::mono_pcm16(8000), 100)
            .unwrap();

        device.release().unwrap();
        device.release().unwrap();

        assert_eq!(context.microphone().device_releases(), 1);
        assert!(matches!(
            device.start_recording(),
            Err(CaptureError::DeviceFault(_))
        ));
        assert_eq!(context.lookups(), vec![ServiceLookup::Compat]);
    }

    #[test]
    fn input_pushed_while_stopped_is_held_for_the_next_start() {
        let context = SimulatedContext::new();
        let services = context.services(ServiceLookup::Direct).unwrap();
        let device = services
            .microphone
            .open(&CaptureFormat::mono_pcm16(8000), 100)
            .unwrap();

        device.start_recording().unwrap();
        device.stop().unwrap();
        context.input().push(&[4, 5]);
        device.start_recording().unwrap();

        let mut out = [0i16; 2];
        assert!(device.read(&mut out, None).is_complete());
        assert_eq!(out, [4, 5]);
    }

    #[test]
    fn overflow_is_reported_by_the_device() {
        let context = SimulatedContext::new();
        let services = context.services(ServiceLookup::Direct).unwrap();
        let device = services
            .microphone
            .open(&CaptureFormat::mono_pcm16(8000), 4)
            .unwrap();

        device.start_recording().unwrap();
        context.input().push(&ramp(0, 10));

        assert_eq!(device.overruns(), 6);
    }
}
