pub mod config;
pub mod patterns;

pub use config::{TrafficConfig, TrafficPattern};
pub use patterns::{Request, TrafficGenerator, TrafficStats};
