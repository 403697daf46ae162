pub mod audio_mode_guard;
pub mod echo_canceler_slot;
pub mod frame_source;
