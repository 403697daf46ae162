pub mod audio_mode;
pub mod device_context;
pub mod echo_canceler;
pub mod microphone;
