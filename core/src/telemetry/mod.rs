//! Counters, stage timers and the immutable snapshot every pipeline call returns.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
