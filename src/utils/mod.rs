//! # Utilities Module
//!
//! Vector mathematics and seeded random selection shared by navigation and generation.

pub mod math;
pub mod random;

pub use math::*;
pub use random::*;
