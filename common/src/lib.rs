//! fxwallet Common Types
//!
//! Shared types used across the fxwallet crates: currencies, monetary
//! rounding rules, identifiers and the caller-facing error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
