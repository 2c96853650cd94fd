use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

use crate::timeq::Cycle;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// Cycles to simulate.
    pub cycles: Cycle,
    /// Keep ticking after `cycles` until every queue drains, up to this many extra cycles.
    pub drain_timeout: Cycle,
    /// Period of the JSONL utilization records; 0 disables them.
    pub stat_period: Cycle,
    /// Emit the per-bank, per-cycle utilization trace.
    pub bank_trace: bool,
    /// Output directory; defaults to a fresh run directory under `performance_logs/`.
    pub output_dir: Option<PathBuf>,
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycles: 100_000,
            drain_timeout: 100_000,
            stat_period: 10_000,
            bank_trace: false,
            output_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, SimConfig};
    use toml::Table;

    #[test]
    fn missing_section_falls_back_to_default() {
        let table: Table = toml::from_str("[other]\nx = 1\n").unwrap();
        let cfg = SimConfig::from_section(table.get("sim"));
        assert_eq!(SimConfig::default().cycles, cfg.cycles);
    }

    #[test]
    fn section_overrides_fields() {
        let table: Table = toml::from_str("[sim]\ncycles = 42\nbank_trace = true\n").unwrap();
        let cfg = SimConfig::from_section(table.get("sim"));
        assert_eq!(42, cfg.cycles);
        assert!(cfg.bank_trace);
        assert_eq!(SimConfig::default().stat_period, cfg.stat_period);
    }
}
