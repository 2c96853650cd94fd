use std::str::FromStr;

use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPattern {
    /// Consecutive bursts, wrapping inside the footprint.
    #[default]
    Stream,
    /// Uniformly random bursts inside the footprint.
    Random,
    /// Runs of consecutive bursts inside one randomly chosen row.
    RowLocal,
}

impl FromStr for TrafficPattern {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "stream" => Ok(Self::Stream),
            "random" => Ok(Self::Random),
            "row_local" => Ok(Self::RowLocal),
            _ => Err(format!(
                "unsupported traffic pattern '{}', expected one of: stream, random, row_local",
                value
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub pattern: TrafficPattern,
    /// Probability of generating a new request in a cycle.
    pub injection_rate: f64,
    /// Fraction of generated requests that are writes.
    pub write_ratio: f64,
    pub seed: u64,
    /// Stop generating after this many requests.
    pub num_requests: Option<u64>,
    pub base_addr: u64,
    pub footprint_bytes: u64,
    /// Distance between consecutive `stream` requests.
    pub stride_bytes: u64,
    /// Requests per row for `row_local`.
    pub row_run: u32,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            pattern: TrafficPattern::Stream,
            injection_rate: 0.5,
            write_ratio: 0.3,
            seed: 0,
            num_requests: None,
            base_addr: 0,
            footprint_bytes: 256 << 20,
            stride_bytes: 64,
            row_run: 8,
        }
    }
}

impl TrafficConfig {
    pub fn ensure_valid(&self) {
        assert!(
            (0.0..=1.0).contains(&self.injection_rate),
            "injection_rate must be within [0, 1]"
        );
        assert!((0.0..=1.0).contains(&self.write_ratio), "write_ratio must be within [0, 1]");
        assert!(self.footprint_bytes > 0, "footprint_bytes must be > 0");
        assert!(self.stride_bytes > 0, "stride_bytes must be > 0");
        assert!(self.row_run > 0, "row_run must be > 0");
    }
}

#[cfg(test)]
mod tests {
    use super::{TrafficConfig, TrafficPattern};
    use crate::sim::config::Config;

    #[test]
    fn pattern_names_parse() {
        assert_eq!(Ok(TrafficPattern::RowLocal), "row_local".parse());
        assert!("zigzag".parse::<TrafficPattern>().is_err());
    }

    #[test]
    fn section_overrides_defaults() {
        let table: toml::Table =
            toml::from_str("[traffic]\npattern = \"random\"\nseed = 7\nnum_requests = 100\n").unwrap();
        let cfg = TrafficConfig::from_section(table.get("traffic"));
        assert_eq!(TrafficPattern::Random, cfg.pattern);
        assert_eq!(7, cfg.seed);
        assert_eq!(Some(100), cfg.num_requests);
        assert_eq!(64, cfg.stride_bytes);
        cfg.ensure_valid();
    }
}
