use std::time::Duration;

use crate::models::audio_models::{AudioSessionId, CaptureFormat, ReadOutcome};
use crate::models::error::CaptureError;

/// Platform microphone service: sizes and opens capture devices.
///
/// Implemented by:
/// - `CpalMicrophone` (frame-source-cpal)
/// - `SimulatedMicrophone` (tests)
pub trait MicrophoneService: Send + Sync {
    /// Smallest internal buffer, in samples, the platform accepts for `format`.
    ///
    /// Fails with `DeviceUnavailable` when the format cannot be captured.
    fn min_buffer_size(&self, format: &CaptureFormat) -> Result<usize, CaptureError>;

    /// Open a capture device. The device does not record until
    /// `start_recording` is called.
    fn open(
        &self,
        format: &CaptureFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// An open capture device.
///
/// `read` blocks the caller; `stop` and `release` must be callable from a
/// different thread and must make an in-flight `read` return promptly.
pub trait CaptureDevice: Send + Sync {
    /// Platform session id, used to attach effects.
    fn session_id(&self) -> AudioSessionId;

    fn start_recording(&self) -> Result<(), CaptureError>;

    /// Fill `out` with captured samples in chronological order.
    fn read(&self, out: &mut [i16], timeout: Option<Duration>) -> ReadOutcome;

    fn stop(&self) -> Result<(), CaptureError>;

    /// Samples lost to internal buffer overflow since the device was opened.
    fn overruns(&self) -> u64;

    /// Release the device handle. Further reads report `Closed`.
    fn release(&self) -> Result<(), CaptureError>;
}
