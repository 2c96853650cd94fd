use std::env;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::dram::config::QueueStructure;
use crate::dram::stats::SchedulerStats;
use crate::dram::utilization::UtilizationCounters;
use crate::timeq::Cycle;
use crate::traffic::patterns::TrafficStats;

/// Create the directory a run writes into.
///
/// An explicit `output_dir` is used as is; otherwise a fresh `run_<secs>_<pid>` directory is
/// made under `$DRAMSCHED_PERF_LOG_DIR`, or `performance_logs/` when that is unset.
pub fn perf_run_dir(output_dir: Option<&Path>) -> Result<PathBuf> {
    let run_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let root = env::var("DRAMSCHED_PERF_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("performance_logs"));
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let pid = std::process::id();
            root.join(format!("run_{ts}_{pid}"))
        }
    };
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("cannot create output directory {}", run_dir.display()))?;
    Ok(run_dir)
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub queue_structure: QueueStructure,
    pub cycles: Cycle,
    /// Whether every queue emptied before the drain timeout.
    pub drained: bool,
    pub busy_ratio: f64,
    pub avg_queue_latency: f64,
    pub scheduler: SchedulerStats,
    pub utilization: UtilizationCounters,
    pub traffic: TrafficStats,
}

/// One line of `stats.jsonl`: counters of the window ending at `cycle`.
#[derive(Debug, Serialize)]
pub struct StatsRecord {
    pub cycle: Cycle,
    pub queue_usage: usize,
    pub utilization: UtilizationCounters,
}

pub struct StatsLog {
    writer: BufWriter<File>,
}

impl StatsLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_json<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        writeln!(self.writer, "{payload}")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Sink for the per-bank utilization trace.
pub fn bank_trace_writer(run_dir: &Path) -> Result<Box<dyn Write + Send>> {
    let path = run_dir.join("bank_trace.csv");
    let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

pub fn write_summary(run_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let path = run_dir.join("summary.json");
    let payload = serde_json::to_string_pretty(summary)?;
    fs::write(&path, payload).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}
