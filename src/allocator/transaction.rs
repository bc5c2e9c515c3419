//! # Power Claim Transactions
//!
//! `PowerAllocator` owns the available-power snapshot of one control tick
//! and hands it out through transactions:
//!
//! ```text
//! Idle --begin--> Open --commit/rollback--> Idle
//! ```
//!
//! Inside a transaction every `claim` is all-or-nothing: a rejected claim
//! leaves `available` and the pending claim exactly as they were. Claims
//! are applied in call order and later claims see what earlier ones left.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::policy::{
    AdmissionContext, AdmissionHook, AdmissionPolicy, ClaimOptions, RangeSearch, SystemTopology,
};
use super::waterfall;
use crate::domain::PhaseAwareQuantity;
use crate::error::AllocatorError;

/// Everything that shapes allocation decisions, besides the snapshot itself
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocatorSettings {
    pub topology: SystemTopology,
    pub admission: AdmissionPolicy,
    pub range_search: RangeSearch,
}

#[derive(Debug, Clone)]
struct OpenTransaction {
    checkpoint: PhaseAwareQuantity,
    /// Drawn per source channel
    pending_claim: PhaseAwareQuantity,
    /// Admitted requests per consuming channel
    pending_consumption: PhaseAwareQuantity,
}

/// Transactional allocator over a phase-aware power budget
#[derive(Debug)]
pub struct PowerAllocator {
    available: PhaseAwareQuantity,
    settings: AllocatorSettings,
    hook: Option<Box<dyn AdmissionHook>>,
    transaction: Option<OpenTransaction>,
}

impl PowerAllocator {
    pub fn new(available: PhaseAwareQuantity, settings: AllocatorSettings) -> Self {
        Self {
            available,
            settings,
            hook: None,
            transaction: None,
        }
    }

    /// Install the third admission check (e.g. an inverter ceiling)
    pub fn with_admission_hook(mut self, hook: Box<dyn AdmissionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Power still unclaimed
    pub fn available(&self) -> &PhaseAwareQuantity {
        &self.available
    }

    pub fn settings(&self) -> &AllocatorSettings {
        &self.settings
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Snapshot taken by `begin`, `None` outside a transaction
    pub fn checkpoint(&self) -> Option<&PhaseAwareQuantity> {
        self.transaction.as_ref().map(|tx| &tx.checkpoint)
    }

    /// Power drawn so far in the open transaction, `None` outside a transaction
    pub fn pending_claim(&self) -> Option<&PhaseAwareQuantity> {
        self.transaction.as_ref().map(|tx| &tx.pending_claim)
    }

    /// Power consumed by the claims admitted so far, per requesting channel.
    /// Unlike `pending_claim`, cross-phase and DC sourcing are attributed to
    /// the phase that consumes the power.
    pub fn pending_consumption(&self) -> Option<&PhaseAwareQuantity> {
        self.transaction.as_ref().map(|tx| &tx.pending_consumption)
    }

    /// Replace the snapshot with fresh telemetry for the next tick
    pub fn reset_available(&mut self, available: PhaseAwareQuantity) -> Result<(), AllocatorError> {
        if self.transaction.is_some() {
            return Err(AllocatorError::TransactionAlreadyOpen);
        }
        self.available = available;
        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), AllocatorError> {
        if self.transaction.is_some() {
            return Err(AllocatorError::TransactionAlreadyOpen);
        }
        self.transaction = Some(OpenTransaction {
            checkpoint: self.available.clone(),
            pending_claim: PhaseAwareQuantity::zero(),
            pending_consumption: PhaseAwareQuantity::zero(),
        });
        debug!(available = %self.available, "transaction opened");
        Ok(())
    }

    /// Try to claim exactly `requested`.
    ///
    /// Returns `Ok(false)` when the waterfall cannot cover the request or an
    /// admission check rejects it; state is then untouched.
    pub fn claim(
        &mut self,
        requested: &PhaseAwareQuantity,
        options: ClaimOptions,
    ) -> Result<bool, AllocatorError> {
        if self.transaction.is_none() {
            return Err(AllocatorError::NoOpenTransaction);
        }
        if !requested.is_finite() {
            return Err(AllocatorError::InvalidRequest(format!(
                "non-finite request: {requested}"
            )));
        }

        let undo = self.available.clone();
        let mut result =
            waterfall::allocate(&mut self.available, requested, &self.settings.topology);

        if !result.is_satisfied() {
            if !options.force {
                debug!(unmet = %result.unmet, "claim rejected: sources exhausted");
                self.available = undo;
                return Ok(false);
            }
            waterfall::punish_battery(&mut self.available, &mut result);
        }

        if let Some(reason) = self.admission_rejection(requested, &result.drawn, options) {
            debug!(
                reason,
                requested = %requested,
                primary = options.primary,
                "claim rejected by admission"
            );
            self.available = undo;
            return Ok(false);
        }

        if let Some(tx) = self.transaction.as_mut() {
            tx.pending_claim += &result.drawn;
            tx.pending_consumption += &requested.non_negative();
        }
        debug!(requested = %requested, drawn = %result.drawn, "claim accepted");
        Ok(true)
    }

    /// Claim somewhere between `min` and `max`.
    ///
    /// Always tries `max` first. With [`RangeSearch::MaxOnly`] that is the
    /// only attempt; with [`RangeSearch::Bisect`] the allocator falls back
    /// to `min` and then narrows towards the largest point of the segment
    /// `min..max` that is admitted.
    pub fn claim_range(
        &mut self,
        min: &PhaseAwareQuantity,
        max: &PhaseAwareQuantity,
        options: ClaimOptions,
    ) -> Result<bool, AllocatorError> {
        if self.claim(max, options)? {
            return Ok(true);
        }
        match self.settings.range_search {
            RangeSearch::MaxOnly => Ok(false),
            RangeSearch::Bisect { steps } => self.bisect_claim(min, max, options, steps),
        }
    }

    fn bisect_claim(
        &mut self,
        min: &PhaseAwareQuantity,
        max: &PhaseAwareQuantity,
        options: ClaimOptions,
        steps: u32,
    ) -> Result<bool, AllocatorError> {
        if !self.probe(min, options)? {
            return Ok(false);
        }

        // lo is always admitted, hi never
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        for _ in 0..steps {
            let mid = (lo + hi) / 2.0;
            if self.probe(&min.lerp(max, mid), options)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let point = min.lerp(max, lo);
        debug!(fraction = lo, point = %point, "range search settled");
        self.claim(&point, options)
    }

    /// Claim and immediately undo, reporting whether the claim was admitted
    fn probe(
        &mut self,
        requested: &PhaseAwareQuantity,
        options: ClaimOptions,
    ) -> Result<bool, AllocatorError> {
        let available = self.available.clone();
        let transaction = self.transaction.clone();
        let admitted = self.claim(requested, options)?;
        if admitted {
            self.available = available;
            self.transaction = transaction;
        }
        Ok(admitted)
    }

    pub fn rollback(&mut self) -> Result<(), AllocatorError> {
        let tx = self
            .transaction
            .take()
            .ok_or(AllocatorError::NoOpenTransaction)?;
        debug!(discarded = %tx.pending_claim, "transaction rolled back");
        self.available = tx.checkpoint;
        Ok(())
    }

    /// Close the transaction and return what it drew from each channel
    pub fn commit(&mut self) -> Result<PhaseAwareQuantity, AllocatorError> {
        let tx = self
            .transaction
            .take()
            .ok_or(AllocatorError::NoOpenTransaction)?;
        info!(
            claimed = %tx.pending_claim,
            remaining = %self.available,
            "transaction committed"
        );
        Ok(tx.pending_claim)
    }

    /// Reservation, primary floor and the optional hook, in that order.
    /// Forced claims skip all of them.
    fn admission_rejection(
        &self,
        requested: &PhaseAwareQuantity,
        drawn: &PhaseAwareQuantity,
        options: ClaimOptions,
    ) -> Option<&'static str> {
        if options.force {
            return None;
        }

        let policy = &self.settings.admission;
        let total = self.available.total();

        if !options.primary && total < policy.battery_reservation_w {
            return Some("battery reservation");
        }
        if options.primary && total <= policy.primary_floor_w {
            return Some("primary floor");
        }

        if let Some(hook) = &self.hook {
            let mut pending_claim = self.pending_claim().cloned().unwrap_or_default();
            pending_claim += drawn;
            let mut pending_consumption = self.pending_consumption().cloned().unwrap_or_default();
            pending_consumption += &requested.non_negative();
            let ctx = AdmissionContext {
                available: &self.available,
                pending_claim: &pending_claim,
                pending_consumption: &pending_consumption,
                requested,
                options,
            };
            if !hook.admit(&ctx) {
                return Some("admission hook");
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::InverterCeiling;
    use crate::domain::AcPhase;
    use proptest::prelude::*;

    fn settings(saldating: bool, efficiency: f64, reservation: f64) -> AllocatorSettings {
        AllocatorSettings {
            topology: SystemTopology {
                saldating,
                acdcac_efficiency: efficiency,
            },
            admission: AdmissionPolicy {
                battery_reservation_w: reservation,
                ..AdmissionPolicy::default()
            },
            range_search: RangeSearch::MaxOnly,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_state_errors() {
        let mut allocator = PowerAllocator::new(PhaseAwareQuantity::zero(), settings(false, 1.0, 0.0));
        let req = PhaseAwareQuantity::zero();

        assert_eq!(
            allocator.claim(&req, ClaimOptions::secondary()),
            Err(AllocatorError::NoOpenTransaction)
        );
        assert_eq!(
            allocator.claim_range(&req, &req, ClaimOptions::secondary()),
            Err(AllocatorError::NoOpenTransaction)
        );
        assert_eq!(allocator.commit(), Err(AllocatorError::NoOpenTransaction));
        assert_eq!(allocator.rollback(), Err(AllocatorError::NoOpenTransaction));

        allocator.begin().unwrap();
        assert_eq!(allocator.begin(), Err(AllocatorError::TransactionAlreadyOpen));
        assert_eq!(
            allocator.reset_available(PhaseAwareQuantity::zero()),
            Err(AllocatorError::TransactionAlreadyOpen)
        );
        allocator.rollback().unwrap();
        assert!(!allocator.in_transaction());
    }

    #[test]
    fn test_non_finite_request_is_an_error() {
        let mut allocator = PowerAllocator::new(PhaseAwareQuantity::zero(), settings(false, 1.0, 0.0));
        allocator.begin().unwrap();
        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, f64::NAN);
        assert!(matches!(
            allocator.claim(&req, ClaimOptions::secondary()),
            Err(AllocatorError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_begin_sets_checkpoint_and_zero_pending() {
        let available = PhaseAwareQuantity::new(100.0, 0.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 1.0, 0.0));
        assert!(allocator.checkpoint().is_none());
        allocator.begin().unwrap();
        assert_eq!(allocator.checkpoint(), Some(&available));
        assert_eq!(allocator.pending_claim(), Some(&PhaseAwareQuantity::zero()));
    }

    #[test]
    fn test_shortfall_without_force_leaves_state_untouched() {
        let available = PhaseAwareQuantity::new(30.0, 0.0, 0.0, 50.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 1.0, 0.0));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 100.0);
        assert!(!allocator.claim(&req, ClaimOptions::primary()).unwrap());
        assert_eq!(allocator.available(), &available);
        assert_eq!(allocator.pending_claim(), Some(&PhaseAwareQuantity::zero()));
    }

    #[test]
    fn test_forced_shortfall_punishes_dc() {
        let available = PhaseAwareQuantity::new(30.0, 0.0, 0.0, 50.0);
        let mut allocator = PowerAllocator::new(available, settings(false, 1.0, 0.0));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 100.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary().forced()).unwrap());
        assert!(close(allocator.available().dc, -20.0));

        let claimed = allocator.commit().unwrap();
        assert!(close(claimed.l1, 30.0));
        assert!(close(claimed.dc, 70.0));
        assert!(close(claimed.total(), 100.0));
    }

    #[test]
    fn test_cross_phase_efficiency_accounting() {
        let available = PhaseAwareQuantity::new(0.0, 100.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available, settings(false, 0.5, 0.0));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 50.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert!(close(allocator.available().l2, 0.0));

        let claimed = allocator.commit().unwrap();
        assert!(close(claimed.l2, 100.0));
        assert!(close(claimed.l1, 0.0));
    }

    #[test]
    fn test_reservation_rejects_secondary() {
        let available = PhaseAwareQuantity::new(150.0, 0.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 1.0, 200.0));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 10.0);
        assert!(!allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert_eq!(allocator.available(), &available);

        // primary may eat into the reservation
        assert!(allocator.claim(&req, ClaimOptions::primary()).unwrap());
    }

    #[test]
    fn test_reservation_applies_after_the_draw() {
        let available = PhaseAwareQuantity::new(300.0, 0.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available, settings(false, 1.0, 200.0));
        allocator.begin().unwrap();

        let fits = PhaseAwareQuantity::on_phase(AcPhase::L1, 100.0);
        assert!(allocator.claim(&fits, ClaimOptions::secondary()).unwrap());
        let too_much = PhaseAwareQuantity::on_phase(AcPhase::L1, 1.0);
        assert!(!allocator.claim(&too_much, ClaimOptions::secondary()).unwrap());
    }

    #[test]
    fn test_primary_floor() {
        let available = PhaseAwareQuantity::new(80.0, 0.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available, settings(false, 1.0, 0.0));
        allocator.begin().unwrap();

        // leaves 50 -> at the floor, rejected
        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 30.0);
        assert!(!allocator.claim(&req, ClaimOptions::primary()).unwrap());
        // leaves 51 -> accepted
        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 29.0);
        assert!(allocator.claim(&req, ClaimOptions::primary()).unwrap());
        // forced ignores the floor
        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 51.0);
        assert!(allocator.claim(&req, ClaimOptions::primary().forced()).unwrap());
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let available = PhaseAwareQuantity::new(500.0, 500.0, 500.0, 1000.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 0.9, 0.0));
        allocator.begin().unwrap();
        let req = PhaseAwareQuantity::new(700.0, 0.0, 300.0, 0.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert_ne!(allocator.available(), &available);

        allocator.rollback().unwrap();
        assert_eq!(allocator.available(), &available);
        assert!(allocator.pending_claim().is_none());
    }

    #[test]
    fn test_later_claims_see_earlier_draws() {
        let available = PhaseAwareQuantity::new(1000.0, 0.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available, settings(false, 1.0, 0.0));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 600.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert!(!allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert_eq!(allocator.available().l1, 400.0);
        assert_eq!(allocator.pending_claim().map(|p| p.l1), Some(600.0));
    }

    #[test]
    fn test_claim_range_max_only_falls_back_to_failure() {
        let available = PhaseAwareQuantity::new(2000.0, 0.0, 0.0, 0.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 1.0, 0.0));
        allocator.begin().unwrap();

        let min = PhaseAwareQuantity::on_phase(AcPhase::L1, 1400.0);
        let max = PhaseAwareQuantity::on_phase(AcPhase::L1, 3700.0);
        assert!(!allocator
            .claim_range(&min, &max, ClaimOptions::secondary())
            .unwrap());
        assert_eq!(allocator.available(), &available);

        let max = PhaseAwareQuantity::on_phase(AcPhase::L1, 1800.0);
        assert!(allocator
            .claim_range(&min, &max, ClaimOptions::secondary())
            .unwrap());
        assert_eq!(allocator.available().l1, 200.0);
    }

    #[test]
    fn test_claim_range_bisect_finds_largest_point() {
        let available = PhaseAwareQuantity::new(2000.0, 0.0, 0.0, 0.0);
        let mut s = settings(false, 1.0, 0.0);
        s.range_search = RangeSearch::Bisect { steps: 12 };
        let mut allocator = PowerAllocator::new(available, s);
        allocator.begin().unwrap();

        let min = PhaseAwareQuantity::on_phase(AcPhase::L1, 1400.0);
        let max = PhaseAwareQuantity::on_phase(AcPhase::L1, 3700.0);
        assert!(allocator
            .claim_range(&min, &max, ClaimOptions::secondary())
            .unwrap());

        let claimed = allocator.commit().unwrap();
        assert!(claimed.l1 >= 1400.0);
        assert!(claimed.l1 <= 2000.0);
        // 12 halvings of a 2300 W span leave less than 1 W of slack
        assert!(claimed.l1 > 1999.0, "claimed {}", claimed.l1);
    }

    #[test]
    fn test_claim_range_bisect_rejects_when_min_does_not_fit() {
        let available = PhaseAwareQuantity::new(1000.0, 0.0, 0.0, 0.0);
        let mut s = settings(false, 1.0, 0.0);
        s.range_search = RangeSearch::Bisect { steps: 8 };
        let mut allocator = PowerAllocator::new(available.clone(), s);
        allocator.begin().unwrap();

        let min = PhaseAwareQuantity::on_phase(AcPhase::L1, 1400.0);
        let max = PhaseAwareQuantity::on_phase(AcPhase::L1, 3700.0);
        assert!(!allocator
            .claim_range(&min, &max, ClaimOptions::secondary())
            .unwrap());
        assert_eq!(allocator.available(), &available);
        assert_eq!(allocator.pending_claim(), Some(&PhaseAwareQuantity::zero()));
    }

    #[test]
    fn test_admission_hook_rejects_over_ceiling() {
        let available = PhaseAwareQuantity::new(5000.0, 5000.0, 5000.0, 0.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 1.0, 0.0))
            .with_admission_hook(Box::new(InverterCeiling {
                max_total_w: 4000.0,
                max_per_phase_w: None,
            }));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::new(1000.0, 1000.0, 1000.0, 0.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        // second claim would bring the transaction to 6 kW
        assert!(!allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        // forced claims bypass the hook
        assert!(allocator.claim(&req, ClaimOptions::secondary().forced()).unwrap());
    }

    #[test]
    fn test_inverter_ceiling_counts_dc_sourced_consumption() {
        let available = PhaseAwareQuantity::dc_only(10_000.0);
        let mut allocator = PowerAllocator::new(available.clone(), settings(false, 1.0, 0.0))
            .with_admission_hook(Box::new(InverterCeiling {
                max_total_w: 4000.0,
                max_per_phase_w: Some(2000.0),
            }));
        allocator.begin().unwrap();

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 6000.0);
        assert!(!allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert_eq!(allocator.available(), &available);
        assert_eq!(allocator.pending_consumption(), Some(&PhaseAwareQuantity::zero()));

        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 1500.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert_eq!(allocator.pending_consumption(), Some(&req));
    }

    #[test]
    fn test_inverter_ceiling_charges_consuming_phase() {
        let available = PhaseAwareQuantity::new(0.0, 3000.0, 3000.0, 0.0);
        let mut allocator = PowerAllocator::new(available, settings(false, 1.0, 0.0))
            .with_admission_hook(Box::new(InverterCeiling {
                max_total_w: 10_000.0,
                max_per_phase_w: Some(3000.0),
            }));
        allocator.begin().unwrap();

        // 3000 W on L1 sourced entirely from L2: L1 is at its limit, L2 consumes nothing
        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 3000.0);
        assert!(allocator.claim(&req, ClaimOptions::secondary()).unwrap());
        assert_eq!(allocator.pending_claim().map(|p| p.l2), Some(3000.0));

        // any further L1 consumption goes over the per-phase limit
        let req = PhaseAwareQuantity::on_phase(AcPhase::L1, 10.0);
        assert!(!allocator.claim(&req, ClaimOptions::secondary()).unwrap());
    }

    #[test]
    fn test_bisect_probes_leave_consumption_untouched() {
        let available = PhaseAwareQuantity::new(2000.0, 0.0, 0.0, 0.0);
        let mut s = settings(false, 1.0, 0.0);
        s.range_search = RangeSearch::Bisect { steps: 6 };
        let mut allocator = PowerAllocator::new(available, s);
        allocator.begin().unwrap();

        let min = PhaseAwareQuantity::on_phase(AcPhase::L1, 1000.0);
        let max = PhaseAwareQuantity::on_phase(AcPhase::L1, 3000.0);
        assert!(allocator
            .claim_range(&min, &max, ClaimOptions::secondary())
            .unwrap());
        let consumed = allocator.pending_consumption().unwrap().l1;
        let drawn = allocator.pending_claim().unwrap().l1;
        assert!(close(consumed, drawn));
    }

    fn quantity(max: f64) -> impl Strategy<Value = PhaseAwareQuantity> {
        (0.0..max, 0.0..max, 0.0..max, 0.0..max)
            .prop_map(|(l1, l2, l3, dc)| PhaseAwareQuantity::new(l1, l2, l3, dc))
    }

    proptest! {
        #[test]
        fn prop_conservation_holds(
            available in quantity(5000.0),
            requests in prop::collection::vec((quantity(2000.0), any::<bool>(), any::<bool>()), 1..8),
            saldating in any::<bool>(),
            efficiency in 0.5f64..=1.0,
            reservation in 0.0f64..2000.0,
        ) {
            let mut allocator = PowerAllocator::new(available, settings(saldating, efficiency, reservation));
            allocator.begin().unwrap();
            for (req, primary, force) in &requests {
                let options = ClaimOptions { primary: *primary, force: *force };
                allocator.claim(req, options).unwrap();
                let checkpoint = allocator.checkpoint().unwrap().total();
                let pending = allocator.pending_claim().unwrap().total();
                prop_assert!((checkpoint - allocator.available().total() - pending).abs() < 1e-6);
            }
            let checkpoint = allocator.checkpoint().unwrap().total();
            let remaining = allocator.available().total();
            let claimed = allocator.commit().unwrap();
            prop_assert!((checkpoint - remaining - claimed.total()).abs() < 1e-6);
        }

        #[test]
        fn prop_rejected_claim_is_a_no_op(
            available in quantity(3000.0),
            warmup in quantity(1000.0),
            req in quantity(3000.0),
            primary in any::<bool>(),
            reservation in 0.0f64..3000.0,
        ) {
            let mut allocator = PowerAllocator::new(available, settings(false, 0.8, reservation));
            allocator.begin().unwrap();
            allocator.claim(&warmup, ClaimOptions::primary().forced()).unwrap();

            let before_available = allocator.available().clone();
            let before_pending = allocator.pending_claim().cloned();
            let options = ClaimOptions { primary, force: false };
            if !allocator.claim(&req, options).unwrap() {
                prop_assert_eq!(allocator.available(), &before_available);
                prop_assert_eq!(allocator.pending_claim().cloned(), before_pending);
            }
        }

        #[test]
        fn prop_bisect_range_claims_conserve_and_are_all_or_nothing(
            available in quantity(5000.0),
            requests in prop::collection::vec(
                (quantity(1500.0), quantity(1500.0), any::<bool>(), any::<bool>()),
                1..6,
            ),
            saldating in any::<bool>(),
            efficiency in 0.5f64..=1.0,
            reservation in 0.0f64..2000.0,
            steps in 1u32..10,
        ) {
            let mut s = settings(saldating, efficiency, reservation);
            s.range_search = RangeSearch::Bisect { steps };
            let mut allocator = PowerAllocator::new(available, s);
            allocator.begin().unwrap();

            for (min, extra, primary, force) in &requests {
                let max = min + extra;
                let options = ClaimOptions { primary: *primary, force: *force };
                let before_available = allocator.available().clone();
                let before_pending = allocator.pending_claim().cloned();

                let admitted = allocator.claim_range(min, &max, options).unwrap();
                if !admitted {
                    prop_assert_eq!(allocator.available(), &before_available);
                    prop_assert_eq!(allocator.pending_claim().cloned(), before_pending);
                }

                let checkpoint = allocator.checkpoint().unwrap().total();
                let pending = allocator.pending_claim().unwrap().total();
                prop_assert!((checkpoint - allocator.available().total() - pending).abs() < 1e-6);
            }
        }

        #[test]
        fn prop_non_forced_claims_keep_dc_non_negative(
            available in quantity(3000.0),
            requests in prop::collection::vec(quantity(1500.0), 1..6),
            saldating in any::<bool>(),
        ) {
            let mut allocator = PowerAllocator::new(available, settings(saldating, 0.9, 0.0));
            allocator.begin().unwrap();
            for req in &requests {
                allocator.claim(req, ClaimOptions::primary()).unwrap();
                prop_assert!(allocator.available().dc >= -1e-6);
            }
        }

        #[test]
        fn prop_rollback_restores_available(
            available in quantity(3000.0),
            requests in prop::collection::vec((quantity(2000.0), any::<bool>()), 1..6),
        ) {
            let mut allocator = PowerAllocator::new(available.clone(), settings(false, 0.9, 0.0));
            allocator.begin().unwrap();
            for (req, force) in &requests {
                let options = ClaimOptions { primary: true, force: *force };
                allocator.claim(req, options).unwrap();
            }
            allocator.rollback().unwrap();
            prop_assert_eq!(allocator.available(), &available);
        }
    }
}
