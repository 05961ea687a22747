pub mod random_walk;

use crate::models::tick::Tick;

/// Supplier of ticks in non-decreasing timestamp order.
///
/// Real transports (exchange websockets, polling) live outside this crate and
/// only need to produce `Tick` values.
pub trait TickSource {
    fn next_tick(&mut self) -> Option<Tick>;
}

pub use random_walk::RandomWalkSource;
