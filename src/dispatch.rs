//! # Allocation Round
//!
//! Caller side of the allocator for one control tick: every consumer that
//! announced a power range gets its own transaction, primary consumers
//! first. The result is the list of grants to hand back to the
//! demand-response layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::allocator::{ClaimOptions, PowerAllocator};
use crate::domain::{PhaseAwareQuantity, PowerRange, RangeEndpoint};
use crate::error::{AllocatorError, QuantityError};

/// Priority tier of a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerPriority {
    Primary,
    #[default]
    Secondary,
}

/// Power request of one consumer for this tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerRequest {
    pub id: String,
    pub ranges: Vec<PowerRange>,
    #[serde(default)]
    pub priority: ConsumerPriority,
    /// Must run regardless of overhead (e.g. frost protection)
    #[serde(default)]
    pub force: bool,
}

impl ConsumerRequest {
    pub fn options(&self) -> ClaimOptions {
        ClaimOptions {
            primary: self.priority == ConsumerPriority::Primary,
            force: self.force,
        }
    }

    /// Lower and upper bound of the request as phase-aware quantities
    pub fn bounds(&self) -> Result<(PhaseAwareQuantity, PhaseAwareQuantity), QuantityError> {
        let min = PhaseAwareQuantity::from_power_ranges(&self.ranges, RangeEndpoint::Min)?;
        let max = PhaseAwareQuantity::from_power_ranges(&self.ranges, RangeEndpoint::Max)?;
        Ok((min, max))
    }
}

/// Outcome for one consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grant {
    pub consumer_id: String,
    /// Power drawn per source channel, `None` when the consumer was rejected
    pub drawn: Option<PhaseAwareQuantity>,
}

impl Grant {
    pub fn is_granted(&self) -> bool {
        self.drawn.is_some()
    }
}

#[derive(Debug, Error)]
pub enum AllocationRoundError {
    #[error("Consumer {consumer_id} sent an unusable request: {source}")]
    Request {
        consumer_id: String,
        #[source]
        source: QuantityError,
    },

    #[error(transparent)]
    Allocator(#[from] AllocatorError),
}

/// Snapshot and requests of one tick, as recorded for offline replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub available: PhaseAwareQuantity,
    #[serde(default)]
    pub consumers: Vec<ConsumerRequest>,
}

impl TickInput {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Run one allocation round over `requests`.
///
/// Primary consumers are served before secondary ones; within a tier the
/// input order is kept. Grants are returned in service order.
///
/// Every request is converted to bounds before the first transaction opens,
/// so an unusable request fails the round without committing anything.
pub fn dispatch_round(
    allocator: &mut PowerAllocator,
    requests: &[ConsumerRequest],
) -> Result<Vec<Grant>, AllocationRoundError> {
    let (primary, secondary): (Vec<&ConsumerRequest>, Vec<&ConsumerRequest>) = requests
        .iter()
        .partition(|r| r.priority == ConsumerPriority::Primary);

    let resolved = primary
        .into_iter()
        .chain(secondary)
        .map(|request| {
            let (min, max) = request.bounds().map_err(|source| AllocationRoundError::Request {
                consumer_id: request.id.clone(),
                source,
            })?;
            Ok((request, min, max))
        })
        .collect::<Result<Vec<_>, AllocationRoundError>>()?;

    let mut grants = Vec::with_capacity(resolved.len());
    for (request, min, max) in resolved {
        let grant = serve(allocator, request, &min, &max)?;
        grants.push(grant);
    }

    let granted = grants.iter().filter(|g| g.is_granted()).count();
    info!(
        consumers = grants.len(),
        granted,
        remaining = %allocator.available(),
        "allocation round finished"
    );
    Ok(grants)
}

fn serve(
    allocator: &mut PowerAllocator,
    request: &ConsumerRequest,
    min: &PhaseAwareQuantity,
    max: &PhaseAwareQuantity,
) -> Result<Grant, AllocationRoundError> {
    allocator.begin()?;
    let admitted = match allocator.claim_range(min, max, request.options()) {
        Ok(admitted) => admitted,
        Err(e) => {
            allocator.rollback()?;
            return Err(e.into());
        }
    };

    let drawn = if admitted {
        Some(allocator.commit()?)
    } else {
        allocator.rollback()?;
        None
    };
    debug!(consumer = %request.id, granted = drawn.is_some(), "consumer served");

    Ok(Grant {
        consumer_id: request.id.clone(),
        drawn,
    })
}
