//! # Phase-Aware Power Quantity
//!
//! Four-channel power value (L1, L2, L3, DC) used for every budget the
//! allocator handles: available overhead, requested power and claimed
//! power.
//!
//! The same four fields can be read three ways:
//! - named fields (`q.l1`, `q.dc`, ...)
//! - by phase index: 0 = total (read only), 1..=3 = L1..L3, 4 = DC
//! - by commodity key: [`AcPhase`] (no key exists for DC or the total)
//!
//! All views are projections over the fields; nothing is cached.
//! The total is always recomputed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Neg, Sub, SubAssign};
use std::str::FromStr;

use super::phase::AcPhase;
use super::range::{PowerRange, RangeCommodity, RangeEndpoint};
use crate::error::QuantityError;

/// Index of the derived total in the indexed view
pub const TOTAL_INDEX: usize = 0;

/// Index of the DC channel in the indexed view
pub const DC_INDEX: usize = 4;

/// Power split over the three AC phases and the DC-coupled source (W)
///
/// Deliberately not `Copy`: the allocator mutates quantities in place, and
/// every copy (checkpoints, undo points) is an explicit `clone()`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseAwareQuantity {
    /// Phase L1 power (W)
    pub l1: f64,
    /// Phase L2 power (W)
    pub l2: f64,
    /// Phase L3 power (W)
    pub l3: f64,
    /// DC-coupled power, e.g. battery or DC-side PV (W)
    pub dc: f64,
}

impl PhaseAwareQuantity {
    pub fn new(l1: f64, l2: f64, l3: f64, dc: f64) -> Self {
        Self { l1, l2, l3, dc }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Quantity with a single AC phase set
    pub fn on_phase(phase: AcPhase, watts: f64) -> Self {
        let mut q = Self::zero();
        q[phase] = watts;
        q
    }

    /// Quantity with only the DC channel set
    pub fn dc_only(watts: f64) -> Self {
        Self::new(0.0, 0.0, 0.0, watts)
    }

    /// Sum of all four channels
    pub fn total(&self) -> f64 {
        self.l1 + self.l2 + self.l3 + self.dc
    }

    /// Sum of the three AC phases
    pub fn ac_total(&self) -> f64 {
        self.l1 + self.l2 + self.l3
    }

    pub fn is_finite(&self) -> bool {
        self.l1.is_finite() && self.l2.is_finite() && self.l3.is_finite() && self.dc.is_finite()
    }

    /// Read through the indexed view
    pub fn by_phase_index(&self, index: usize) -> Result<f64, QuantityError> {
        match index {
            TOTAL_INDEX => Ok(self.total()),
            DC_INDEX => Ok(self.dc),
            i => AcPhase::from_index(i)
                .map(|phase| self[phase])
                .ok_or(QuantityError::IndexOutOfRange(i)),
        }
    }

    /// Write through the indexed view. The total (index 0) is derived and
    /// cannot be written.
    pub fn set_by_phase_index(&mut self, index: usize, watts: f64) -> Result<(), QuantityError> {
        match index {
            TOTAL_INDEX => Err(QuantityError::TotalIsReadOnly),
            DC_INDEX => {
                self.dc = watts;
                Ok(())
            }
            i => {
                let phase = AcPhase::from_index(i).ok_or(QuantityError::IndexOutOfRange(i))?;
                self[phase] = watts;
                Ok(())
            }
        }
    }

    /// Read through the keyed view using a textual commodity key
    pub fn by_commodity(&self, key: &str) -> Result<f64, QuantityError> {
        Ok(self[parse_commodity(key)?])
    }

    /// Write through the keyed view using a textual commodity key
    pub fn set_by_commodity(&mut self, key: &str, watts: f64) -> Result<(), QuantityError> {
        let phase = parse_commodity(key)?;
        self[phase] = watts;
        Ok(())
    }

    /// In-place addition that allows chaining
    pub fn add_in_place(&mut self, other: &PhaseAwareQuantity) -> &mut Self {
        *self += other;
        self
    }

    /// In-place subtraction that allows chaining
    pub fn sub_in_place(&mut self, other: &PhaseAwareQuantity) -> &mut Self {
        *self -= other;
        self
    }

    /// Build a quantity from announced power ranges.
    ///
    /// Symmetric three-phase ranges contribute a third of the selected
    /// endpoint to each phase; single-phase ranges contribute the endpoint
    /// to their phase. DC ranges are rejected.
    pub fn from_power_ranges(
        ranges: &[PowerRange],
        endpoint: RangeEndpoint,
    ) -> Result<Self, QuantityError> {
        let mut q = Self::zero();
        for range in ranges {
            range.validate()?;
            let watts = range.endpoint(endpoint);
            match range.commodity {
                RangeCommodity::ThreePhaseSymmetric => {
                    let per_phase = watts / 3.0;
                    q.l1 += per_phase;
                    q.l2 += per_phase;
                    q.l3 += per_phase;
                }
                RangeCommodity::L1 => q.l1 += watts,
                RangeCommodity::L2 => q.l2 += watts,
                RangeCommodity::L3 => q.l3 += watts,
                RangeCommodity::Dc => {
                    return Err(QuantityError::UnsupportedRangeCommodity(
                        range.commodity.to_string(),
                    ))
                }
            }
        }
        Ok(q)
    }

    /// Copy with every negative channel replaced by zero
    pub fn non_negative(&self) -> Self {
        Self::new(self.l1.max(0.0), self.l2.max(0.0), self.l3.max(0.0), self.dc.max(0.0))
    }

    /// Linear interpolation `self + (other - self) * t`, per channel
    pub fn lerp(&self, other: &PhaseAwareQuantity, t: f64) -> Self {
        Self {
            l1: self.l1 + (other.l1 - self.l1) * t,
            l2: self.l2 + (other.l2 - self.l2) * t,
            l3: self.l3 + (other.l3 - self.l3) * t,
            dc: self.dc + (other.dc - self.dc) * t,
        }
    }
}

fn parse_commodity(key: &str) -> Result<AcPhase, QuantityError> {
    AcPhase::from_str(key).map_err(|_| QuantityError::UnknownCommodity(key.to_string()))
}

impl Index<AcPhase> for PhaseAwareQuantity {
    type Output = f64;

    fn index(&self, phase: AcPhase) -> &f64 {
        match phase {
            AcPhase::L1 => &self.l1,
            AcPhase::L2 => &self.l2,
            AcPhase::L3 => &self.l3,
        }
    }
}

impl IndexMut<AcPhase> for PhaseAwareQuantity {
    fn index_mut(&mut self, phase: AcPhase) -> &mut f64 {
        match phase {
            AcPhase::L1 => &mut self.l1,
            AcPhase::L2 => &mut self.l2,
            AcPhase::L3 => &mut self.l3,
        }
    }
}

impl AddAssign<&PhaseAwareQuantity> for PhaseAwareQuantity {
    fn add_assign(&mut self, other: &PhaseAwareQuantity) {
        self.l1 += other.l1;
        self.l2 += other.l2;
        self.l3 += other.l3;
        self.dc += other.dc;
    }
}

impl AddAssign for PhaseAwareQuantity {
    fn add_assign(&mut self, other: PhaseAwareQuantity) {
        *self += &other;
    }
}

impl SubAssign<&PhaseAwareQuantity> for PhaseAwareQuantity {
    fn sub_assign(&mut self, other: &PhaseAwareQuantity) {
        self.l1 -= other.l1;
        self.l2 -= other.l2;
        self.l3 -= other.l3;
        self.dc -= other.dc;
    }
}

impl SubAssign for PhaseAwareQuantity {
    fn sub_assign(&mut self, other: PhaseAwareQuantity) {
        *self -= &other;
    }
}

impl Add<&PhaseAwareQuantity> for &PhaseAwareQuantity {
    type Output = PhaseAwareQuantity;

    fn add(self, other: &PhaseAwareQuantity) -> PhaseAwareQuantity {
        let mut out = self.clone();
        out += other;
        out
    }
}

impl Add for PhaseAwareQuantity {
    type Output = PhaseAwareQuantity;

    fn add(mut self, other: PhaseAwareQuantity) -> PhaseAwareQuantity {
        self += &other;
        self
    }
}

impl Sub<&PhaseAwareQuantity> for &PhaseAwareQuantity {
    type Output = PhaseAwareQuantity;

    fn sub(self, other: &PhaseAwareQuantity) -> PhaseAwareQuantity {
        let mut out = self.clone();
        out -= other;
        out
    }
}

impl Sub for PhaseAwareQuantity {
    type Output = PhaseAwareQuantity;

    fn sub(mut self, other: PhaseAwareQuantity) -> PhaseAwareQuantity {
        self -= &other;
        self
    }
}

impl Neg for PhaseAwareQuantity {
    type Output = PhaseAwareQuantity;

    fn neg(self) -> PhaseAwareQuantity {
        Self::new(-self.l1, -self.l2, -self.l3, -self.dc)
    }
}

impl fmt::Display for PhaseAwareQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L1 {:.1}W, L2 {:.1}W, L3 {:.1}W, DC {:.1}W (total {:.1}W)",
            self.l1,
            self.l2,
            self.l3,
            self.dc,
            self.total()
        )
    }
}
