//! Phase-aware power claim engine of the Open Energy Controller.
//!
//! Apportions each control tick's overhead (three AC phases plus a
//! DC-coupled source) between EV chargers, heaters and pumps, honouring a
//! battery reservation, consumer priority and conversion losses.

pub mod allocator;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod telemetry;

pub use allocator::{AllocatorSettings, ClaimOptions, PowerAllocator};
pub use domain::{AcPhase, PhaseAwareQuantity, PowerRange, RangeCommodity, RangeEndpoint};
pub use error::{AllocatorError, QuantityError};
