//! Process-wide audio mode register.
//!
//! Desktop audio hosts have no routing mode equivalent to a phone's
//! "in communication" mode, so the mode lives in a process-global register.
//! Every frame source in the process shares it, matching the platform
//! semantics callers rely on.

use parking_lot::Mutex;

use frame_source_core::{AudioMode, AudioModeService, CaptureError};

static PROCESS_MODE: Mutex<AudioMode> = parking_lot::const_mutex(AudioMode::Normal);

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessAudioMode;

impl AudioModeService for ProcessAudioMode {
    fn mode(&self) -> AudioMode {
        *PROCESS_MODE.lock()
    }

    fn set_mode(&self, mode: AudioMode) -> Result<(), CaptureError> {
        let mut current = PROCESS_MODE.lock();
        log::debug!("Process audio mode: {:?} -> {:?}", *current, mode);
        *current = mode;
        Ok(())
    }
}
