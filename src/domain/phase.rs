use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// AC phase conductor of a three-phase connection.
///
/// This is the commodity key of the keyed view on
/// [`PhaseAwareQuantity`](super::PhaseAwareQuantity). DC and the total have
/// no commodity key, so parsing `"DC"` or `"total"` fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum AcPhase {
    L1,
    L2,
    L3,
}

impl AcPhase {
    /// Phase number as used by the indexed view (1..=3)
    pub fn index(self) -> usize {
        match self {
            AcPhase::L1 => 1,
            AcPhase::L2 => 2,
            AcPhase::L3 => 3,
        }
    }

    /// Phase for an indexed-view position, `None` for total (0), DC (4) and
    /// anything out of range
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            1 => Some(AcPhase::L1),
            2 => Some(AcPhase::L2),
            3 => Some(AcPhase::L3),
            _ => None,
        }
    }

    /// The two other phases in ascending order.
    ///
    /// Cross-phase sourcing walks this list, so the order is fixed.
    pub fn others(self) -> [AcPhase; 2] {
        match self {
            AcPhase::L1 => [AcPhase::L2, AcPhase::L3],
            AcPhase::L2 => [AcPhase::L1, AcPhase::L3],
            AcPhase::L3 => [AcPhase::L1, AcPhase::L2],
        }
    }
}
