//! Demand-driven combinators over pull sequences.
//!
//! - [`buffered`]: pull up to N values at once, publishing in
//!   completion order.
//! - [`merge`]: interleave several sources by completion time.
//! - [`fork`]: split one sequence across several consumers with no
//!   duplication.
//! - [`debounce`]: batch values separated by quiet windows.
//! - [`drain`]: run a sequence to exhaustion for its side effects.
//!
//! Every combinator spawns its producer tasks with
//! `tokio::task::spawn_local`, so construction must happen inside a
//! `tokio::task::LocalSet`. Concurrency is cooperative interleaving on
//! one thread, never parallelism.

mod buffered;
mod debounce;
mod drain;
mod fork;
mod merge;

pub use buffered::*;
pub use debounce::*;
pub use drain::*;
pub use fork::*;
pub use merge::*;
