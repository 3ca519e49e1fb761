pub mod ring_buffer;
pub mod sweep_header;
