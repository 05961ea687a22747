pub mod latency;
pub mod scoreboard;
