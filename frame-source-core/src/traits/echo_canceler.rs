use crate::models::audio_models::AudioSessionId;
use crate::models::error::CaptureError;

/// Platform acoustic echo cancellation effect factory.
pub trait EchoCancelerService: Send + Sync {
    /// Whether the platform can provide the effect at all.
    fn is_available(&self) -> bool;

    /// Create an effect instance bound to a capture session.
    ///
    /// `Ok(None)` means the platform declined for this session.
    fn create(&self, session: AudioSessionId) -> Result<Option<Box<dyn EchoCanceler>>, CaptureError>;
}

/// One echo canceller instance attached to a capture session.
pub trait EchoCanceler: Send + Sync {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), CaptureError>;

    fn enabled(&self) -> bool;

    fn release(&mut self) -> Result<(), CaptureError>;
}
