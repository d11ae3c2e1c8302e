//! The deferred settling primitive and the buffered handoff channel.
//!
//! The channel hands values from one producer to one or more
//! demand-driven consumers: writes buffer until a read takes them, reads
//! queue until a value or the end marker arrives, and a write's returned
//! future settles only on real consumption, which is the backpressure
//! contract the combinator crate is built on.
//!
//! Everything here is single-threaded: `!Send` futures over `Rc` state,
//! no locks.

mod channel;
mod deferred;

pub use channel::*;
pub use deferred::*;
