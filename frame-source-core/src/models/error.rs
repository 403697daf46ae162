use thiserror::Error;

/// Errors returned by frame source operations.
///
/// Expected conditions (missing permission, no device, stopped mid-read) are
/// ordinary values of this type. Short reads carry the samples captured
/// before the read ended, in chronological order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device not available")]
    DeviceUnavailable,

    #[error("capture not started")]
    NotStarted,

    #[error("capture interrupted after {} samples", partial.len())]
    Interrupted { partial: Vec<i16> },

    #[error("end of stream after {} samples", partial.len())]
    EndOfStream { partial: Vec<i16> },

    #[error("frame read timed out after {} samples", partial.len())]
    Timeout { partial: Vec<i16> },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("device fault: {0}")]
    DeviceFault(String),
}

impl CaptureError {
    /// Samples captured before a short read ended, if this is a short read.
    pub fn partial_samples(&self) -> Option<&[i16]> {
        match self {
            Self::Interrupted { partial }
            | Self::EndOfStream { partial }
            | Self::Timeout { partial } => Some(partial),
            _ => None,
        }
    }
}
