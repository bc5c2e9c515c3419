use serde::{Deserialize, Serialize};

use crate::domain::{AcPhase, PhaseAwareQuantity};

/// Minimum overhead a primary consumer needs left over before it may claim (W)
pub const PRIMARY_FLOOR_W: f64 = 50.0;

/// Residual power below this counts as fully satisfied (W)
pub const SATISFIED_TOLERANCE_W: f64 = 1e-6;

/// Electrical topology of the installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTopology {
    /// Net metering across phases (saldating). When set, cross-phase
    /// sourcing is tried before DC.
    pub saldating: bool,

    /// Efficiency of the AC -> DC -> AC path used for cross-phase sourcing,
    /// in (0, 1]. Drawing `x` W for another phase costs `x / efficiency` W.
    pub acdcac_efficiency: f64,
}

impl Default for SystemTopology {
    fn default() -> Self {
        Self {
            saldating: false,
            acdcac_efficiency: 0.9,
        }
    }
}

/// Admission thresholds applied after the waterfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Non-primary claims may not take the total available below this (W)
    pub battery_reservation_w: f64,

    /// Primary claims are rejected when the total available is at or below this (W)
    pub primary_floor_w: f64,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            battery_reservation_w: 0.0,
            primary_floor_w: PRIMARY_FLOOR_W,
        }
    }
}

/// Strategy used by `claim_range`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum RangeSearch {
    /// Try the maximum, fail otherwise
    #[default]
    MaxOnly,
    /// Try the maximum, then the minimum, then bisect between them
    Bisect { steps: u32 },
}

/// Priority and override flags of a single claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClaimOptions {
    /// Primary consumers may eat into the battery reservation
    pub primary: bool,
    /// Source any shortfall from DC and skip admission checks
    pub force: bool,
}

impl ClaimOptions {
    pub fn secondary() -> Self {
        Self {
            primary: false,
            force: false,
        }
    }

    pub fn primary() -> Self {
        Self {
            primary: true,
            force: false,
        }
    }

    pub fn forced(self) -> Self {
        Self {
            force: true,
            ..self
        }
    }
}

/// State handed to an [`AdmissionHook`] once the built-in checks pass
#[derive(Debug)]
pub struct AdmissionContext<'a> {
    /// Available power after this claim's draws
    pub available: &'a PhaseAwareQuantity,
    /// Everything drawn in the open transaction per source channel, this
    /// claim included
    pub pending_claim: &'a PhaseAwareQuantity,
    /// Everything consumed in the open transaction per requesting channel,
    /// this claim included
    pub pending_consumption: &'a PhaseAwareQuantity,
    /// The request being admitted
    pub requested: &'a PhaseAwareQuantity,
    pub options: ClaimOptions,
}

/// Extra admission check run after the reservation and primary-floor checks.
///
/// Forced claims never reach the hook.
pub trait AdmissionHook: Send + Sync + std::fmt::Debug {
    /// Return false to reject the claim
    fn admit(&self, ctx: &AdmissionContext<'_>) -> bool;
}

/// Continuous inverter power ceiling.
///
/// Rejects a claim when the AC power consumed in the open transaction would
/// exceed what the inverter can deliver continuously, in total or on any
/// single phase. Consumption is counted on the phase that uses the power,
/// whichever source the waterfall drew it from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterCeiling {
    pub max_total_w: f64,
    #[serde(default)]
    pub max_per_phase_w: Option<f64>,
}

impl AdmissionHook for InverterCeiling {
    fn admit(&self, ctx: &AdmissionContext<'_>) -> bool {
        let consumed = ctx.pending_consumption;
        if consumed.ac_total() > self.max_total_w {
            return false;
        }
        match self.max_per_phase_w {
            Some(limit) => [AcPhase::L1, AcPhase::L2, AcPhase::L3]
                .iter()
                .all(|&phase| consumed[phase] <= limit),
            None => true,
        }
    }
}
