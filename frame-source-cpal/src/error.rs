use frame_source_core::CaptureError;
use thiserror::Error;

/// Failures inside the cpal backend, before they are folded into
/// `CaptureError` at the trait boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("host unavailable: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error("no default input device on host {0}")]
    NoInputDevice(String),

    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedRate(u32),

    #[error("failed to query input configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("failed to pause stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),

    #[error("capture thread: {0}")]
    Thread(String),
}

impl From<BackendError> for CaptureError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::HostUnavailable(_)
            | BackendError::NoInputDevice(_)
            | BackendError::UnsupportedRate(_)
            | BackendError::SupportedConfigs(_)
            | BackendError::DefaultConfig(_)
            | BackendError::UnsupportedFormat(_)
            | BackendError::BuildStream(_) => {
                log::warn!("Capture device unavailable: {}", error);
                CaptureError::DeviceUnavailable
            }
            BackendError::Play(_) | BackendError::Pause(_) | BackendError::Thread(_) => {
                CaptureError::DeviceFault(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_map_to_device_unavailable() {
        let err: CaptureError = BackendError::UnsupportedRate(1).into();
        assert_eq!(err, CaptureError::DeviceUnavailable);

        let err: CaptureError = BackendError::NoInputDevice("ALSA".into()).into();
        assert_eq!(err, CaptureError::DeviceUnavailable);
    }

    #[test]
    fn runtime_failures_map_to_device_fault() {
        let err: CaptureError = BackendError::Thread("capture thread exited".into()).into();
        assert_eq!(
            err,
            CaptureError::DeviceFault("capture thread: capture thread exited".into())
        );
    }
}
