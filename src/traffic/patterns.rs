use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::dram::config::DramConfig;
use crate::dram::controller::Controller;
use crate::traffic::config::{TrafficConfig, TrafficPattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub hex_addr: u64,
    pub is_write: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrafficStats {
    pub generated: u64,
    pub accepted: u64,
    pub reads: u64,
    pub writes: u64,
    /// Admission attempts repeated after a full queue.
    pub retries: u64,
}

/// Synthetic request source for one channel.
///
/// A request the controller refuses is kept and offered again on the next tick; nothing new is
/// generated while one is outstanding.
pub struct TrafficGenerator {
    config: TrafficConfig,
    rng: StdRng,
    burst_bytes: u64,
    // bytes covered by one row under the column-lowest address mapping
    row_bytes: u64,
    stream_offset: u64,
    run_offset: u64,
    run_left: u32,
    pending: Option<Request>,
    stopped: bool,
    stats: TrafficStats,
}

impl TrafficGenerator {
    pub fn new(config: TrafficConfig, dram: &DramConfig) -> Self {
        config.ensure_valid();
        info!(
            "traffic: {:?}, injection rate {}, write ratio {}, seed {}",
            config.pattern, config.injection_rate, config.write_ratio, config.seed
        );
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            burst_bytes: dram.burst_bytes,
            row_bytes: dram.columns as u64 * dram.burst_bytes,
            stream_offset: 0,
            run_offset: 0,
            run_left: 0,
            pending: None,
            stopped: false,
            stats: TrafficStats::default(),
            config,
        }
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    fn next_offset(&mut self) -> u64 {
        let footprint = self.config.footprint_bytes;
        match self.config.pattern {
            TrafficPattern::Stream => {
                let offset = self.stream_offset;
                self.stream_offset = (self.stream_offset + self.config.stride_bytes) % footprint;
                offset
            }
            TrafficPattern::Random => {
                let bursts = (footprint / self.burst_bytes).max(1);
                self.rng.gen_range(0..bursts) * self.burst_bytes
            }
            TrafficPattern::RowLocal => {
                if self.run_left == 0 {
                    let rows = (footprint / self.row_bytes).max(1);
                    self.run_offset = self.rng.gen_range(0..rows) * self.row_bytes;
                    self.run_left = self.config.row_run;
                }
                let step = (self.config.row_run - self.run_left) as u64;
                self.run_left -= 1;
                self.run_offset + (step * self.burst_bytes) % self.row_bytes
            }
        }
    }

    pub fn next_request(&mut self) -> Request {
        let offset = self.next_offset() % self.config.footprint_bytes;
        let is_write = self.rng.gen_bool(self.config.write_ratio);
        Request {
            hex_addr: self.config.base_addr.wrapping_add(offset),
            is_write,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.config
            .num_requests
            .map_or(false, |limit| self.stats.generated >= limit)
    }

    /// Generate nothing new from now on; a refused request is still retried.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_none() && (self.stopped || self.is_exhausted())
    }

    pub fn tick(&mut self, ctrl: &mut Controller) {
        let request = match self.pending.take() {
            Some(request) => {
                self.stats.retries += 1;
                request
            }
            None => {
                if self.stopped || self.is_exhausted() {
                    return;
                }
                if !self.rng.gen_bool(self.config.injection_rate) {
                    return;
                }
                self.stats.generated += 1;
                self.next_request()
            }
        };

        if ctrl.add_transaction(request.hex_addr, request.is_write) {
            self.stats.accepted += 1;
            if request.is_write {
                self.stats.writes += 1;
            } else {
                self.stats.reads += 1;
            }
        } else {
            self.pending = Some(request);
        }
    }
}
