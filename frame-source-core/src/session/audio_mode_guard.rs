use std::sync::Arc;

use crate::models::audio_models::AudioMode;
use crate::models::error::CaptureError;
use crate::traits::audio_mode::AudioModeService;

/// Scoped entry into a process-wide audio mode.
///
/// `enter` records the current mode and switches; `release` (or drop) puts
/// the recorded mode back unless restoring was disabled.
pub struct AudioModeGuard {
    service: Arc<dyn AudioModeService>,
    previous: AudioMode,
    restore: bool,
    released: bool,
}

impl AudioModeGuard {
    pub fn enter(
        service: Arc<dyn AudioModeService>,
        mode: AudioMode,
        restore: bool,
    ) -> Result<Self, CaptureError> {
        let previous = service.mode();
        if previous != mode {
            service.set_mode(mode)?;
            log::debug!("Audio mode switched: {:?} -> {:?}", previous, mode);
        }
        Ok(Self {
            service,
            previous,
            restore,
            released: false,
        })
    }

    /// Mode that was active before `enter`.
    pub fn previous(&self) -> AudioMode {
        self.previous
    }

    pub fn release(mut self) -> Result<(), CaptureError> {
        self.restore_previous()
    }

    fn restore_previous(&mut self) -> Result<(), CaptureError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if !self.restore || self.service.mode() == self.previous {
            return Ok(());
        }
        self.service.set_mode(self.previous)?;
        log::debug!("Audio mode restored to {:?}", self.previous);
        Ok(())
    }
}

impl Drop for AudioModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore_previous() {
            log::warn!("Failed to restore audio mode {:?}: {}", self.previous, e);
        }
    }
}
