//! Core abstractions for the rill iteration toolkit.
//!
//! A pull sequence is "zero or more values over time", consumed by
//! repeatedly requesting the next value. This crate defines the trait,
//! the normalization of loose inputs into sequences at the API boundary,
//! and the error taxonomy shared by the channel and combinator crates.

mod error;
mod sequence;
mod source;

pub use error::*;
pub use sequence::*;
pub use source::*;
