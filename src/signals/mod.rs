pub mod features;
pub mod tick_buffer;
