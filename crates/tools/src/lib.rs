//! Shared pieces of the `aub-devinfo` and `aub-devtest` binaries

pub mod cli;
pub mod loopback;
pub mod report;

pub use cli::CommonArgs;
pub use loopback::{DirectionStats, LoopbackOptions, LoopbackStats, Payload, run_loopback};
