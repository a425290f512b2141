pub mod model;
pub mod naming;

pub use model::{Bits, OptLevel, Os, Variant};
