use crate::error::TickRejection;
use serde::{Deserialize, Serialize};

/// One market data sample. Timestamps are milliseconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub price: f64,
    pub volume: f64,
    pub timestamp: i64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl Tick {
    pub fn new(price: f64, volume: f64, timestamp: i64) -> Self {
        Self {
            price,
            volume,
            timestamp,
            bid: None,
            ask: None,
        }
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Boundary check against the last accepted timestamp.
    pub fn validate(
        &self,
        last_timestamp: Option<i64>,
        allow_equal_timestamps: bool,
    ) -> Result<(), TickRejection> {
        if !self.price.is_finite() {
            return Err(TickRejection::NonFinitePrice(self.price));
        }
        if self.price <= 0.0 {
            return Err(TickRejection::NonPositivePrice(self.price));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(TickRejection::InvalidVolume(self.volume));
        }
        if let Some(last) = last_timestamp {
            if self.timestamp < last {
                return Err(TickRejection::OutOfOrder {
                    last,
                    got: self.timestamp,
                });
            }
            if self.timestamp == last && !allow_equal_timestamps {
                return Err(TickRejection::DuplicateTimestamp(self.timestamp));
            }
        }
        Ok(())
    }
}
