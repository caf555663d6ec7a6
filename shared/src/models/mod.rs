//! Documents submitted to the settlement engines

mod inventory;
mod order;
mod supply;

pub use inventory::*;
pub use order::*;
pub use supply::*;
