use thiserror::Error;

/// Lookup and construction errors of [`PhaseAwareQuantity`](crate::domain::PhaseAwareQuantity)
///
/// These are programming defects on the caller side, never a result of
/// the power situation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("Phase index {0} out of range (0 = total, 1..=3 = L1..L3, 4 = DC)")]
    IndexOutOfRange(usize),

    #[error("Phase index 0 is the derived total and cannot be written")]
    TotalIsReadOnly,

    #[error("Unknown commodity key: {0} (only L1, L2 and L3 are keyed)")]
    UnknownCommodity(String),

    #[error("Power range on {0} cannot be converted, only AC ranges are accepted")]
    UnsupportedRangeCommodity(String),

    #[error("Invalid power range: {0}")]
    InvalidRange(String),
}

/// Transaction state errors of [`PowerAllocator`](crate::allocator::PowerAllocator)
///
/// A rejected claim is not an error; it is `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocatorError {
    #[error("A transaction is already open")]
    TransactionAlreadyOpen,

    #[error("No transaction is open")]
    NoOpenTransaction,

    #[error("Invalid claim request: {0}")]
    InvalidRequest(String),
}
