use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{AudioMode, CaptureFormat, ChannelLayout, SampleEncoding};

/// Capture parameters for one session.
///
/// Set once by `FrameSource::start` and immutable for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// Sample rate in Hz.
    pub sample_rate_hz: u32,

    /// Samples per delivered frame.
    pub frame_size: usize,

    /// Always mono.
    pub channels: ChannelLayout,

    /// Always 16-bit signed linear PCM.
    pub encoding: SampleEncoding,
}

impl CaptureConfiguration {
    pub fn new(sample_rate_hz: u32, frame_size: usize) -> Self {
        Self {
            sample_rate_hz,
            frame_size,
            channels: ChannelLayout::Mono,
            encoding: SampleEncoding::Pcm16,
        }
    }

    /// 8 kHz with 20 ms frames.
    pub fn narrowband() -> Self {
        Self::new(8000, 160)
    }

    /// 16 kHz with 20 ms frames.
    pub fn wideband() -> Self {
        Self::new(16000, 320)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate_hz == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.frame_size == 0 {
            return Err("frame size must be positive".into());
        }
        Ok(())
    }

    pub fn format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate_hz: self.sample_rate_hz,
            channels: self.channels,
            encoding: self.encoding,
        }
    }

    /// Wall-clock time covered by one frame.
    pub fn frame_duration(&self) -> Duration {
        if self.sample_rate_hz == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate_hz as f64)
    }
}

/// How a device context resolves its platform service references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLookup {
    /// Ask the platform for its default service directly.
    Direct,
    /// Probe the available services and take the first usable one.
    Compat,
}

/// Behavior switches for a frame source.
///
/// Deserializable with defaults so it can be embedded in an application's
/// own config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSourceOptions {
    /// Strategy for obtaining platform services (default: direct).
    pub service_lookup: ServiceLookup,

    /// Mode the process-wide audio routing is switched to on start
    /// (default: communication).
    pub capture_mode: AudioMode,

    /// Attach the platform echo canceller when one is available (default: true).
    pub echo_cancellation: bool,

    /// Put the previous audio mode back on stop and release (default: true).
    pub restore_audio_mode: bool,

    /// Upper bound on a single `frame()` wait, in milliseconds (default: none).
    pub frame_timeout_ms: Option<u64>,
}

impl FrameSourceOptions {
    pub fn frame_timeout(&self) -> Option<Duration> {
        self.frame_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for FrameSourceOptions {
    fn default() -> Self {
        Self {
            service_lookup: ServiceLookup::Direct,
            capture_mode: AudioMode::Communication,
            echo_cancellation: true,
            restore_audio_mode: true,
            frame_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_values() {
        assert!(CaptureConfiguration::new(0, 160).validate().is_err());
        assert!(CaptureConfiguration::new(8000, 0).validate().is_err());
        assert!(CaptureConfiguration::narrowband().validate().is_ok());
    }

    #[test]
    fn narrowband_frame_is_20ms() {
        let config = CaptureConfiguration::narrowband();
        assert_eq!(config.frame_duration(), Duration::from_millis(20));
        assert_eq!(
            CaptureConfiguration::wideband().frame_duration(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn options_fill_missing_fields_with_defaults() {
        let options: FrameSourceOptions =
            serde_json::from_str(r#"{ "service_lookup": "compat", "frame_timeout_ms": 250 }"#)
                .unwrap();
        assert_eq!(options.service_lookup, ServiceLookup::Compat);
        assert_eq!(options.capture_mode, AudioMode::Communication);
        assert!(options.echo_cancellation);
        assert!(options.restore_audio_mode);
        assert_eq!(options.frame_timeout(), Some(Duration::from_millis(250)));
    }
}
