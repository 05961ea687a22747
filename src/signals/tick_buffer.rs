use crate::models::tick::Tick;
use std::collections::VecDeque;

/// Bounded rolling history of accepted ticks, oldest first.
#[derive(Debug, Clone)]
pub struct TickBuffer {
    ticks: VecDeque<Tick>,
    max_size: usize,
}

impl TickBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            ticks: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    pub fn append(&mut self, tick: Tick) {
        if self.ticks.len() >= self.max_size {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn latest(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    /// Tick `n` positions before the latest (0 = latest).
    pub fn back(&self, n: usize) -> Option<&Tick> {
        let len = self.ticks.len();
        if n >= len {
            return None;
        }
        self.ticks.get(len - 1 - n)
    }

    /// The last `n` ticks, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &Tick> {
        let skip = self.ticks.len().saturating_sub(n);
        self.ticks.iter().skip(skip)
    }

    /// Simple returns between consecutive ticks over the last `window` returns.
    pub fn returns(&self, window: usize) -> Vec<f64> {
        let prices: Vec<f64> = self.last_n(window + 1).map(|t| t.price).collect();
        prices
            .windows(2)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect()
    }

    /// Average spacing between ticks over the last `window` ticks, in ms.
    pub fn mean_interval_ms(&self, window: usize) -> Option<f64> {
        let count = window.min(self.ticks.len());
        if count < 2 {
            return None;
        }
        let first = self.back(count - 1)?.timestamp;
        let last = self.latest()?.timestamp;
        Some(last.saturating_sub(first) as f64 / (count - 1) as f64)
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
    }
}
