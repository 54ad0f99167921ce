use std::fs;
use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use toml::Table;
use gluon::collector::CollectorConfig;
use gluon::sim::config::{Config, SimConfig};
use gluon::sim::exec::{ExecConfig, Recovery};
use gluon::sim::top::Sim;
use gluon::workload::config::WorkloadConfig;

#[derive(Parser)]
#[command(version, about)]
struct GluonArgs {
    #[arg(help="Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help="Override number of collector units")]
    num_collectors: Option<usize>,
    #[arg(long, help="Override number of warps")]
    num_warps: Option<usize>,
    #[arg(long, help="Release on both ports")]
    dual_release: Option<bool>,
    #[arg(long, help="Override workload seed")]
    seed: Option<u64>,
    #[arg(long, help="Enable log at level (0:none, 1:info, 2:debug)")]
    log: Option<u64>,
    #[arg(long, help="Write run statistics as JSON")]
    stats_json: Option<PathBuf>,
    #[arg(long, help="Misprediction recovery (flush, tag)")]
    recovery: Option<Recovery>,
    #[arg(long, help="Print every release")]
    trace: Option<bool>,
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let argv = GluonArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;

    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;
    let mut sim_config = SimConfig::from_section(config_table.get("sim"))?;
    let mut collector_config = CollectorConfig::from_section(config_table.get("collector"))?;
    let mut exec_config = ExecConfig::from_section(config_table.get("exec"))?;
    let mut workload_config = WorkloadConfig::from_section(config_table.get("workload"))?;

    // override toml configs with argv
    sim_config.log_level = argv.log.unwrap_or(sim_config.log_level);
    sim_config.trace = argv.trace.unwrap_or(sim_config.trace);
    sim_config.stats_json = argv.stats_json.or(sim_config.stats_json);
    collector_config.num_collectors = argv.num_collectors.unwrap_or(collector_config.num_collectors);
    collector_config.num_warps = argv.num_warps.unwrap_or(collector_config.num_warps);
    collector_config.dual_release = argv.dual_release.unwrap_or(collector_config.dual_release);
    exec_config.recovery = argv.recovery.unwrap_or(exec_config.recovery);
    workload_config.seed = argv.seed.unwrap_or(workload_config.seed);

    let mut sim = Sim::new(sim_config, collector_config, exec_config, workload_config)?;
    let summary = sim.simulate()?;
    println!("{}", summary.collector);
    println!(
        "{} steps, ipc {:.3}, {} wrong-path results dropped",
        summary.cycles, summary.ipc, summary.wrong_path_results_dropped
    );
    Ok(())
}
