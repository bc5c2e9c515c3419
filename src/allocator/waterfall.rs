//! # Waterfall Allocation
//!
//! Sources a request phase by phase (L1, then L2, then L3):
//! 1. Direct AC from the same phase, lossless
//! 2. DC, lossless, shared by all phases of one request
//! 3. ACDCAC: another phase through the inverter's DC bus, paying the
//!    conversion efficiency on the drawn side
//!
//! Saldating installations swap steps 2 and 3.
//!
//! These functions only move power between `available` and the returned
//! draw. Deciding whether the claim is admitted, and undoing it when not,
//! is the transaction's job.

use tracing::{debug, warn};

use super::policy::{SystemTopology, SATISFIED_TOLERANCE_W};
use crate::domain::{AcPhase, PhaseAwareQuantity};

const PHASE_ORDER: [AcPhase; 3] = [AcPhase::L1, AcPhase::L2, AcPhase::L3];

/// Outcome of one waterfall pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaterfallResult {
    /// Power removed from each source channel
    pub drawn: PhaseAwareQuantity,
    /// Part of the request that no source could cover, per requesting channel
    pub unmet: PhaseAwareQuantity,
}

impl WaterfallResult {
    pub fn is_satisfied(&self) -> bool {
        self.unmet.total() <= SATISFIED_TOLERANCE_W
    }
}

/// Take up to `want` from `source`, never below zero.
///
/// A source that is already negative counts as empty.
fn take(source: &mut f64, want: f64) -> f64 {
    let taken = want.min(source.max(0.0)).max(0.0);
    *source -= taken;
    debug_assert!(
        taken == 0.0 || *source >= -SATISFIED_TOLERANCE_W,
        "waterfall drew a source below zero"
    );
    taken
}

/// Run the waterfall for `requested` against `available`, mutating it.
pub fn allocate(
    available: &mut PhaseAwareQuantity,
    requested: &PhaseAwareQuantity,
    topology: &SystemTopology,
) -> WaterfallResult {
    let mut result = WaterfallResult::default();

    for phase in PHASE_ORDER {
        let mut remaining = requested[phase].max(0.0);
        if remaining <= SATISFIED_TOLERANCE_W {
            continue;
        }

        let direct = take(&mut available[phase], remaining);
        result.drawn[phase] += direct;
        remaining -= direct;
        debug!(%phase, direct_w = direct, remaining_w = remaining, "direct AC step");

        if topology.saldating {
            remaining = cross_phase(available, &mut result.drawn, phase, remaining, topology);
            remaining = from_dc(available, &mut result.drawn, phase, remaining);
        } else {
            remaining = from_dc(available, &mut result.drawn, phase, remaining);
            remaining = cross_phase(available, &mut result.drawn, phase, remaining, topology);
        }

        if remaining > SATISFIED_TOLERANCE_W {
            result.unmet[phase] = remaining;
        }
    }

    let dc_requested = requested.dc.max(0.0);
    if dc_requested > SATISFIED_TOLERANCE_W {
        let direct = take(&mut available.dc, dc_requested);
        result.drawn.dc += direct;
        let remaining = dc_requested - direct;
        if remaining > SATISFIED_TOLERANCE_W {
            result.unmet.dc = remaining;
        }
    }

    result
}

fn from_dc(
    available: &mut PhaseAwareQuantity,
    drawn: &mut PhaseAwareQuantity,
    phase: AcPhase,
    remaining: f64,
) -> f64 {
    if remaining <= SATISFIED_TOLERANCE_W {
        return remaining;
    }
    let taken = take(&mut available.dc, remaining);
    drawn.dc += taken;
    debug!(%phase, dc_w = taken, remaining_w = remaining - taken, "DC step");
    remaining - taken
}

fn cross_phase(
    available: &mut PhaseAwareQuantity,
    drawn: &mut PhaseAwareQuantity,
    phase: AcPhase,
    mut remaining: f64,
    topology: &SystemTopology,
) -> f64 {
    let efficiency = topology.acdcac_efficiency;
    if !(efficiency > 0.0 && efficiency <= 1.0) {
        // outside (0, 1] the conversion path cannot deliver anything sensible
        warn!(efficiency, "ACDCAC step skipped: efficiency outside (0, 1]");
        return remaining;
    }
    for other in phase.others() {
        if remaining <= SATISFIED_TOLERANCE_W {
            break;
        }
        let needed = remaining / efficiency;
        let taken = take(&mut available[other], needed);
        if taken <= 0.0 {
            continue;
        }
        drawn[other] += taken;
        if taken >= needed {
            remaining = 0.0;
        } else {
            remaining -= taken * efficiency;
        }
        debug!(
            %phase,
            source = %other,
            drawn_w = taken,
            credited_w = taken * efficiency,
            remaining_w = remaining,
            "ACDCAC step"
        );
    }
    remaining
}

/// Cover the unmet part of a forced claim from DC, even below zero.
///
/// This is the only path allowed to drive DC negative: the battery is
/// discharged beyond the measured DC overhead.
pub fn punish_battery(available: &mut PhaseAwareQuantity, result: &mut WaterfallResult) {
    let shortfall = result.unmet.total();
    if shortfall <= 0.0 {
        return;
    }
    available.dc -= shortfall;
    result.drawn.dc += shortfall;
    result.unmet = PhaseAwareQuantity::zero();
    warn!(
        shortfall_w = shortfall,
        dc_after_w = available.dc,
        "forced claim drawing shortfall from battery"
    );
}
