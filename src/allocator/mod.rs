//! Phase-Aware Power Claim Engine
//!
//! Splits one control tick's available power (three AC phases plus DC)
//! between competing consumers. Claims run inside transactions and are
//! sourced through a waterfall: direct AC, then DC, then other phases via
//! the inverter's DC bus.

pub mod policy;
pub mod transaction;
pub mod waterfall;

pub use policy::{
    AdmissionContext, AdmissionHook, AdmissionPolicy, ClaimOptions, InverterCeiling, RangeSearch,
    SystemTopology, PRIMARY_FLOOR_W, SATISFIED_TOLERANCE_W,
};
pub use transaction::{AllocatorSettings, PowerAllocator};
pub use waterfall::WaterfallResult;
