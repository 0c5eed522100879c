//! Validated value types shared across the clinic front-desk system.
//!
//! Every type in this crate enforces its invariant at construction time, so
//! downstream code (the core engine, and whatever serve layer sits in front
//! of it) never has to re-check that a name is non-empty or that a monetary
//! amount carries more than two decimal places. Deserialisation goes through
//! the same constructors, so invalid wire input is rejected at the boundary.

pub mod money;
pub mod text;

pub use money::{Money, MoneyError};
pub use text::{Gender, NationalId, NonEmptyText, PhoneNumber, TextError};
