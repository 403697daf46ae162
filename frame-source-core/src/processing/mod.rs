pub mod pcm_converter;
pub mod ring_buffer;
pub mod sample_queue;
