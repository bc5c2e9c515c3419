pub mod phase;
pub mod quantity;
pub mod range;

pub use phase::*;
pub use quantity::*;
pub use range::*;
