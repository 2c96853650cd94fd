use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use crate::base::behavior::Parameterizable;
use crate::base::module::IsModule;
use crate::dram::config::DramConfig;
use crate::dram::controller::Controller;
use crate::sim::config::SimConfig;
use crate::sim::perf_log::{bank_trace_writer, perf_run_dir, write_summary, RunSummary, StatsLog, StatsRecord};
use crate::traffic::config::TrafficConfig;
use crate::traffic::patterns::TrafficGenerator;

/// One channel driven by synthetic traffic for a fixed number of cycles, then drained.
pub struct Sim {
    config: SimConfig,
    controller: Controller,
    traffic: TrafficGenerator,
    run_dir: PathBuf,
    stats_log: Option<StatsLog>,
}

impl Sim {
    pub fn new(sim_config: SimConfig, dram_config: DramConfig, traffic_config: TrafficConfig) -> Result<Self> {
        let dram_config = Arc::new(dram_config);
        let run_dir = perf_run_dir(sim_config.output_dir.as_deref())?;

        let mut controller = Controller::new(Arc::clone(&dram_config));
        if sim_config.bank_trace {
            controller = controller.with_bank_trace(bank_trace_writer(&run_dir)?);
        }
        let stats_log = match sim_config.stat_period {
            0 => None,
            _ => Some(StatsLog::create(&run_dir.join("stats.jsonl"))?),
        };
        let traffic = TrafficGenerator::new(traffic_config, &dram_config);

        Ok(Sim {
            config: sim_config,
            controller,
            traffic,
            run_dir,
            stats_log,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    fn step(&mut self) -> Result<()> {
        self.traffic.tick(&mut self.controller);
        self.controller.tick();

        let now = self.controller.now();
        if let Some(log) = self.stats_log.as_mut() {
            if now % self.config.stat_period == 0 {
                let record = StatsRecord {
                    cycle: now,
                    queue_usage: self.controller.cmd_queue().queue_usage(),
                    utilization: self.controller.take_utilization_window(),
                };
                log.write_json(&record)?;
            }
        }
        Ok(())
    }

    fn is_drained(&self) -> bool {
        self.traffic.is_done() && self.controller.is_drained()
    }

    pub fn simulate(&mut self) -> Result<RunSummary> {
        info!("simulating {} cycles, output in {}", self.config.cycles, self.run_dir.display());
        for _ in 0..self.config.cycles {
            self.step()?;
        }

        self.traffic.stop();
        let mut extra = 0;
        while !self.is_drained() && extra < self.config.drain_timeout {
            self.step()?;
            extra += 1;
        }
        let drained = self.is_drained();
        if !drained {
            warn!(
                "queues not drained after {} extra cycles, {} commands left",
                extra,
                self.controller.cmd_queue().queue_usage()
            );
        }

        self.controller.flush();
        if let Some(log) = self.stats_log.as_mut() {
            log.flush()?;
        }

        let summary = self.summary(drained);
        let path = write_summary(&self.run_dir, &summary)?;
        info!("summary written to {}", path.display());
        Ok(summary)
    }

    fn summary(&self, drained: bool) -> RunSummary {
        let stats = *self.controller.stats();
        let utilization = *self.controller.blood_graph().totals();
        RunSummary {
            queue_structure: self.controller.conf().queue_structure,
            cycles: self.controller.now(),
            drained,
            busy_ratio: utilization.busy_ratio(),
            avg_queue_latency: stats.avg_queue_latency(),
            scheduler: stats,
            utilization,
            traffic: *self.traffic.stats(),
        }
    }
}
