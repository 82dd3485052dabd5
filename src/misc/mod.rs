//! Numerical utilities
mod func;
pub mod linalg;

pub use func::*;
