use std::sync::Arc;

use crate::models::audio_models::PermissionStatus;
use crate::models::config::ServiceLookup;
use crate::models::error::CaptureError;
use crate::traits::audio_mode::AudioModeService;
use crate::traits::echo_canceler::EchoCancelerService;
use crate::traits::microphone::MicrophoneService;

/// Service references resolved from a `DeviceContext`.
#[derive(Clone)]
pub struct PlatformServices {
    pub audio_mode: Arc<dyn AudioModeService>,
    pub microphone: Arc<dyn MicrophoneService>,
    /// `None` when the platform has no echo cancellation effect.
    pub echo_canceler: Option<Arc<dyn EchoCancelerService>>,
}

/// Caller-supplied handle to the platform: answers permission queries and
/// hands out system services.
///
/// Implemented by:
/// - `CpalContext` (frame-source-cpal)
/// - `SimulatedContext` (tests)
pub trait DeviceContext: Send + Sync {
    /// Synchronous query; no request flow.
    fn microphone_permission(&self) -> PermissionStatus;

    /// Resolve system services using the given lookup strategy.
    fn services(&self, lookup: ServiceLookup) -> Result<PlatformServices, CaptureError>;
}
