pub mod evolution;
pub mod learning;
pub mod prediction;
pub mod signal;
pub mod tick;
