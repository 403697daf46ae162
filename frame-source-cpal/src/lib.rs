//! # frame-source-cpal
//!
//! cpal backend for frame-source-core.
//!
//! Provides:
//! - `CpalContext`: `DeviceContext` over the machine's cpal hosts
//! - `CpalMicrophone`: Microphone service for a host's default input device
//! - `ProcessAudioMode`: Process-wide audio mode register
//! - `permissions`: Microphone access probe
//!
//! ## Platform Requirements
//! - Linux: ALSA development headers (`libasound2-dev`) for linking
//!
//! ## Usage
//! ```ignore
//! use frame_source_core::FrameSource;
//! use frame_source_cpal::CpalContext;
//!
//! let context = CpalContext::new();
//! let mut source = FrameSource::new();
//! source.start(8000, 160, &context)?;
//! let frame = source.frame()?;
//! ```

pub mod audio_mode;
pub mod context;
pub mod cpal_mic;
pub mod error;
pub mod permissions;

pub use audio_mode::ProcessAudioMode;
pub use context::CpalContext;
pub use cpal_mic::{CpalCaptureDevice, CpalMicrophone, SUPPORTED_SAMPLE_RATES};
pub use error::BackendError;
