use serde::{Deserialize, Serialize};

/// Process-wide audio routing mode.
///
/// Entering capture switches the platform into `Communication`, which tunes
/// input and output for two-way voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    Normal,
    Ringtone,
    InCall,
    Communication,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self::Normal
    }
}

/// Answer from the platform permission authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Identifier the platform assigns to an open capture session.
///
/// Effects are attached to a session by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioSessionId(pub u32);

impl std::fmt::Display for AudioSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Channel layout of captured frames. Frames are always mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
}

impl ChannelLayout {
    pub fn count(self) -> u16 {
        match self {
            Self::Mono => 1,
        }
    }
}

/// Sample encoding of captured frames. Always 16-bit signed linear PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    Pcm16,
}

impl SampleEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm16 => 2,
        }
    }
}

/// Format requested from the microphone service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureFormat {
    pub sample_rate_hz: u32,
    pub channels: ChannelLayout,
    pub encoding: SampleEncoding,
}

impl CaptureFormat {
    pub fn mono_pcm16(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            channels: ChannelLayout::Mono,
            encoding: SampleEncoding::Pcm16,
        }
    }
}

/// Why a device read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The destination was filled.
    Complete,
    /// Capture was stopped while the read was waiting.
    Stopped,
    /// The device was closed or released underneath the read.
    Closed,
    /// The read deadline elapsed.
    TimedOut,
}

/// Result of a blocking device read: how many samples were written into the
/// destination and why the read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub samples: usize,
    pub status: ReadStatus,
}

impl ReadOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == ReadStatus::Complete
    }
}

/// Real-time level metering for a frame (RMS and peak, 0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameLevels {
    pub rms: f32,
    pub peak: f32,
}

impl FrameLevels {
    pub fn measure(samples: &[i16]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let scale = i16::MAX as f32;
        let mut sum_squares = 0.0f32;
        let mut peak = 0.0f32;
        for &sample in samples {
            let value = (sample as f32 / scale).clamp(-1.0, 1.0);
            sum_squares += value * value;
            peak = peak.max(value.abs());
        }
        Self {
            rms: (sum_squares / samples.len() as f32).sqrt(),
            peak,
        }
    }
}

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub frames_delivered: u64,
    pub samples_delivered: u64,
    pub interrupted_reads: u64,
    pub timed_out_reads: u64,
    /// Samples the device discarded because nobody read them in time.
    pub dropped_samples: u64,
    pub internal_buffer_samples: usize,
    pub echo_canceler_attached: bool,
}
