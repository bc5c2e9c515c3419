use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::QuantityError;

/// Commodity a consumer's power range is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RangeCommodity {
    L1,
    L2,
    L3,
    /// Balanced three-phase load, split evenly across L1..L3
    ThreePhaseSymmetric,
    Dc,
}

/// Which end of a [`PowerRange`] to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeEndpoint {
    Min,
    #[default]
    Max,
}

/// Power a consumer can run at, as announced by the demand-response layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerRange {
    pub commodity: RangeCommodity,
    pub min_w: f64,
    pub max_w: f64,
}

impl PowerRange {
    pub fn new(commodity: RangeCommodity, min_w: f64, max_w: f64) -> Self {
        Self {
            commodity,
            min_w,
            max_w,
        }
    }

    pub fn endpoint(&self, endpoint: RangeEndpoint) -> f64 {
        match endpoint {
            RangeEndpoint::Min => self.min_w,
            RangeEndpoint::Max => self.max_w,
        }
    }

    /// Check the range is finite and ordered
    pub fn validate(&self) -> Result<(), QuantityError> {
        if !self.min_w.is_finite() || !self.max_w.is_finite() {
            return Err(QuantityError::InvalidRange(format!(
                "{} range is not finite: {}..{}",
                self.commodity, self.min_w, self.max_w
            )));
        }
        if self.min_w > self.max_w {
            return Err(QuantityError::InvalidRange(format!(
                "{} range min {}W exceeds max {}W",
                self.commodity, self.min_w, self.max_w
            )));
        }
        Ok(())
    }
}
