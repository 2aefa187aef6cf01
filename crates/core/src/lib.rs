#![forbid(unsafe_code)]

pub mod aggregator;
pub mod model;
pub mod time;

pub use time::Clock;
