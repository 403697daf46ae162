//! # frame-source-core
//!
//! Platform-agnostic microphone frame source.
//!
//! Opens a capture device through a caller-supplied `DeviceContext`, enters
//! a communication audio mode, attaches at most one platform echo canceller
//! and hands out fixed-size frames of 16-bit mono PCM on demand.
//! Platform backends (cpal) implement the traits in `traits/` and plug into
//! the generic `FrameSource`.
//!
//! ## Architecture
//!
//! ```text
//! frame-source-core (this crate)
//! ├── traits/       ← DeviceContext, MicrophoneService, CaptureDevice, AudioModeService, EchoCancelerService
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, FrameSourceOptions, formats
//! ├── processing/   ← RingBuffer, SampleQueue (blocking read), PcmConverter
//! ├── session/      ← FrameSource, AudioModeGuard, EchoCancelerSlot
//! └── simulated     ← in-memory platform for tests (`test-util` feature)
//! ```

pub mod models;
pub mod processing;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod simulated;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    AudioMode, AudioSessionId, CaptureDiagnostics, CaptureFormat, ChannelLayout, FrameLevels,
    PermissionStatus, ReadOutcome, ReadStatus, SampleEncoding,
};
pub use models::config::{CaptureConfiguration, FrameSourceOptions, ServiceLookup};
pub use models::error::CaptureError;
pub use models::state::CaptureState;
pub use processing::pcm_converter::PcmConverter;
pub use processing::ring_buffer::RingBuffer;
pub use processing::sample_queue::SampleQueue;
pub use session::audio_mode_guard::AudioModeGuard;
pub use session::echo_canceler_slot::EchoCancelerSlot;
pub use session::frame_source::{FrameSource, FrameSourceStopper};
pub use traits::audio_mode::AudioModeService;
pub use traits::device_context::{DeviceContext, PlatformServices};
pub use traits::echo_canceler::{EchoCanceler, EchoCancelerService};
pub use traits::microphone::{CaptureDevice, MicrophoneService};
