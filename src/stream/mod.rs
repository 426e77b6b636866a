//! Streaming primitives: one-shot fan-out of a provider stream into a
//! consumable chunk stream plus eventual values, and the token-smoothing
//! transform for free-text mode.

pub mod fanout;
pub mod smooth;

pub use fanout::{fan_out, Eventual, EventualSet, FanOutConfig};
pub use smooth::{smooth, SmoothConfig};
