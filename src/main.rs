use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dramsched::dram::config::{DramConfig, QueueStructure, TimingConfig};
use dramsched::sim::config::{Config, SimConfig};
use dramsched::sim::top::Sim;
use dramsched::traffic::config::TrafficConfig;
use toml::Table;

#[derive(Parser)]
#[command(version, about)]
struct DramschedArgs {
    #[arg(help="Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help="Override number of simulated cycles")]
    cycles: Option<u64>,
    #[arg(long, help="Override queue structure (PER_BANK, PER_RANK, PER_BANK_MLRR)")]
    queue_structure: Option<QueueStructure>,
    #[arg(long, help="Override output directory")]
    output_dir: Option<PathBuf>,
    #[arg(long, help="Log level when RUST_LOG is unset (0:warn, 1:info, 2:debug)")]
    log: Option<u64>,
}

fn log_filter(level: Option<u64>) -> &'static str {
    match level {
        Some(1) => "info",
        Some(2) => "debug",
        _ => "warn",
    }
}

pub fn main() -> Result<()> {
    let argv = DramschedArgs::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(argv.log))).init();

    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;

    let mut sim_config = SimConfig::from_section(config_table.get("sim"));
    let mut dram_config = DramConfig::from_section(config_table.get("dram"));
    if let Some(timing) = config_table.get("timing") {
        dram_config.timing = TimingConfig::from_section(Some(timing));
    }
    let traffic_config = TrafficConfig::from_section(config_table.get("traffic"));

    // override toml configs with argv
    sim_config.cycles = argv.cycles.unwrap_or(sim_config.cycles);
    sim_config.output_dir = argv.output_dir.or(sim_config.output_dir);
    dram_config.queue_structure = argv.queue_structure.unwrap_or(dram_config.queue_structure);
    dram_config.ensure_valid();

    let mut sim = Sim::new(sim_config, dram_config, traffic_config)?;
    let summary = sim.simulate()?;
    println!(
        "{} cycles, {} reads, {} writes, busy {:.3}, avg queue latency {:.1}, drained: {}",
        summary.cycles,
        summary.scheduler.reads(),
        summary.scheduler.writes(),
        summary.busy_ratio,
        summary.avg_queue_latency,
        summary.drained
    );
    println!("results in {}", sim.run_dir().display());
    Ok(())
}
