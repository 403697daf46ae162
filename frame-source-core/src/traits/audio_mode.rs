use crate::models::audio_models::AudioMode;
use crate::models::error::CaptureError;

/// Process-wide audio routing mode.
///
/// Shared by every audio consumer in the process; the frame source only
/// enters it through `AudioModeGuard`.
pub trait AudioModeService: Send + Sync {
    fn mode(&self) -> AudioMode;

    fn set_mode(&self, mode: AudioMode) -> Result<(), CaptureError>;
}
