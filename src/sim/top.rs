use std::fs;
use std::sync::Arc;
use anyhow::{bail, ensure, Context};
use serde::Serialize;
use crate::base::behavior::*;
use crate::collector::{BankedRegFile, CollectorConfig, CollectorInputs, CollectorStats, OperandCollector};
use crate::sim::config::SimConfig;
use crate::sim::exec::{ExecConfig, ExecUnit};
use crate::sim::frontend::Frontend;
use crate::sim::log::Logger;
use crate::sim::trace::Tracer;
use crate::workload::config::WorkloadConfig;
use crate::workload;

/// End-of-run report, also what `stats_json` receives.
#[derive(Debug, Serialize)]
pub struct SimSummary {
    pub cycles: u64,
    pub ipc: f64,
    pub collector: CollectorStats,
    pub exec_accepted: u64,
    pub wrong_path_results_dropped: u64,
    pub rf_reads: u64,
    pub rf_writes: u64,
}

/// Front end, operand collector, register file and functional units of one core,
/// stepped together until every warp has run its program.
pub struct Sim {
    pub config: SimConfig,
    pub logger: Logger,
    pub collector: OperandCollector,
    pub rf: BankedRegFile,
    pub exec: ExecUnit,
    pub frontend: Frontend,
    pub tracer: Tracer,
    cycle: u64,
}

impl Sim {
    pub fn new(
        config: SimConfig,
        collector_config: CollectorConfig,
        exec_config: ExecConfig,
        workload_config: WorkloadConfig,
    ) -> anyhow::Result<Sim> {
        collector_config.validate().context("invalid [collector] config")?;
        exec_config.validate().context("invalid [exec] config")?;
        workload_config.validate().context("invalid [workload] config")?;

        let programs = workload::programs(&workload_config, &collector_config)?;
        let collector_config = Arc::new(collector_config);
        let frontend = Frontend::new(Arc::new(workload_config), programs, collector_config.num_regs)?;
        Ok(Sim {
            logger: Logger::new(config.log_level),
            collector: OperandCollector::new(Arc::clone(&collector_config)),
            rf: BankedRegFile::new(Arc::clone(&collector_config)),
            exec: ExecUnit::new(Arc::new(exec_config), collector_config.num_lanes),
            frontend,
            tracer: Tracer::new(collector_config.num_warps, collector_config.counter_width, config.trace),
            config,
            cycle: 0,
        })
    }

    pub fn finished(&self) -> bool {
        self.frontend.done() && self.collector.occupancy() == 0 && self.exec.idle()
    }

    /// One step of the whole core, in producer-to-consumer order: functional
    /// unit events, recovery, dispatch offers, the collector itself, then the
    /// released instructions into the functional units.
    pub fn step(&mut self) -> anyhow::Result<()> {
        self.logger.set_cycle(self.cycle);
        let recovery = self.exec.conf().recovery;

        let events = self.exec.drain();
        for &(warp, rd) in &events.cleared {
            self.frontend.clear(warp, rd);
        }
        for completion in &events.completions {
            if completion.redirect {
                crate::info!(self.logger, "w{} branch at pc={:#06x} mispredicted", completion.warp, completion.pc);
            }
            self.frontend.resolve(completion, recovery);
        }
        let flush = self.frontend.take_flush();
        if let Some(warp) = flush {
            self.frontend.apply_flush(warp);
        }

        let io = CollectorInputs {
            dispatch: self.frontend.offer(self.collector.dispatch_ready()),
            writebacks: events.writebacks,
            flush,
            branch_tags: self.frontend.tags(),
            exec_ready: self.exec.ready(),
        };
        for inst in io.dispatch.iter().flatten() {
            crate::debug!(self.logger, "offer {}", inst);
        }

        let out = self.collector.step(&mut self.rf, &io);
        self.frontend.accept(&io.dispatch, &out.granted);

        for (port, issued) in out.released.iter().enumerate() {
            let Some(issued) = issued else { continue };
            self.tracer.record(self.cycle, port, issued)?;
            if self.config.trace {
                if let Some(line) = self.tracer.consume(issued.inst.warp) {
                    println!("{}", line);
                }
            }
            let redirect = self.frontend.on_release(issued)?;
            self.exec.accept(port, issued, redirect);
        }

        let occupancy = self.collector.occupancy();
        ensure!(
            occupancy == self.collector.ids_in_flight() && occupancy == self.frontend.in_flight(),
            "@{}: {} busy collector units, {} unreleased ids, {} dispatched instructions in flight",
            self.cycle,
            occupancy,
            self.collector.ids_in_flight(),
            self.frontend.in_flight()
        );

        self.exec.tick_one();
        self.frontend.tick_one();
        self.cycle += 1;
        Ok(())
    }

    pub fn simulate(&mut self) -> anyhow::Result<SimSummary> {
        while !self.finished() {
            if self.cycle >= self.config.timeout {
                bail!("simulation did not drain within {} steps", self.config.timeout);
            }
            self.step()?;
        }
        crate::info!(self.logger, "all warps retired after {} steps", self.cycle);

        let summary = self.summary();
        if let Some(path) = &self.config.stats_json {
            let json = serde_json::to_string_pretty(&summary)?;
            fs::write(path, json).with_context(|| format!("cannot write stats to {}", path.display()))?;
        }
        Ok(summary)
    }

    pub fn summary(&self) -> SimSummary {
        SimSummary {
            cycles: self.cycle,
            ipc: self.collector.stats.ipc(),
            collector: self.collector.stats.clone(),
            exec_accepted: self.exec.accepted(),
            wrong_path_results_dropped: self.exec.dropped(),
            rf_reads: self.rf.num_reads(),
            rf_writes: self.rf.num_writes(),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

impl ModuleBehaviors for Sim {
    fn tick_one(&mut self) {
        if let Err(err) = self.step() {
            panic!("{:#}", err);
        }
    }

    fn reset(&mut self) {
        self.collector.reset();
        self.rf.reset();
        self.exec.reset();
        self.frontend.reset();
        let conf = self.collector.conf();
        self.tracer = Tracer::new(conf.num_warps, conf.counter_width, self.config.trace);
        self.cycle = 0;
    }
}
