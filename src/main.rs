//! core2core command line
//!
//! Runs the full core-pair sweep (or a single pair) and prints the
//! throughput report to stdout.

use clap::{Arg, ArgAction, Command};
use core2core::bench::{PairBenchmark, RunSettings, Sweep};
use core2core::core::config::parse_duration;
use core2core::system::metrics;
use core2core::{affinity, report, Config, CoreId, Error, Result};
use tracing::info;

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    core2core::init(&config)?;

    if matches.get_flag("show-affinity") {
        let mask = affinity::current_affinity()?;
        println!("host cores: {}", affinity::host_core_count());
        println!("allowed:    {}", mask);
        return Ok(());
    }

    if let Some(pair) = matches.get_one::<String>("pair") {
        let (producer, consumer) = parse_pair(pair)?;
        let bench = PairBenchmark::new(RunSettings::from_config(&config));
        let outcome = bench.run(producer, consumer);
        if config.metrics.enabled {
            metrics::record_run(&outcome);
        }
        print!("{}", report::render_pair(&outcome?, config.output.format)?);
    } else {
        let sweep = Sweep::from_config(&config).run()?;
        print!("{}", report::render(&sweep, config.output.format)?);
    }

    if let Some(path) = &config.metrics.dump_path {
        metrics::write_metrics(path)?;
        info!("Wrote metrics to {:?}", path);
    }

    Ok(())
}

/// Command line definition
fn cli() -> Command {
    Command::new("core2core")
        .version(core2core::VERSION)
        .about("Inter-core message-passing throughput matrix.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("cores")
                .long("cores")
                .value_name("N")
                .help("Number of logical cores to sweep (default: all)"),
        )
        .arg(
            Arg::new("messages")
                .short('m')
                .long("messages")
                .value_name("N")
                .help("Messages handed off per core pair"),
        )
        .arg(
            Arg::new("capacity")
                .long("capacity")
                .value_name("SLOTS")
                .help("Handoff channel capacity"),
        )
        .arg(
            Arg::new("warmup")
                .long("warmup")
                .value_name("N")
                .help("Same-core warm-up runs before the sweep"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("DURATION")
                .help("Longest a worker waits on its counterpart (e.g. 500ms, 10s)"),
        )
        .arg(
            Arg::new("on-error")
                .long("on-error")
                .value_name("POLICY")
                .help("What to do when a pair fails (abort, skip)"),
        )
        .arg(
            Arg::new("pair")
                .long("pair")
                .value_name("P,C")
                .help("Measure a single producer,consumer pair instead of sweeping"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Report format (markdown, json)"),
        )
        .arg(
            Arg::new("metrics-file")
                .long("metrics-file")
                .value_name("FILE")
                .help("Record Prometheus metrics and write them here when done"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("show-affinity")
                .long("show-affinity")
                .action(ArgAction::SetTrue)
                .help("Print this thread's OS-reported affinity and exit"),
        )
}

/// Load file and environment configuration, apply CLI overrides, then validate
fn load_config(matches: &clap::ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(config_path) => {
            let mut config = Config::from_file(config_path)?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load()?,
    };

    apply_cli_overrides(&mut config, matches)?;
    config.validate()?;

    Ok(config)
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &clap::ArgMatches) -> Result<()> {
    if let Some(cores) = matches.get_one::<String>("cores") {
        config.benchmark.core_count = cores
            .parse()
            .map_err(|e| Error::config(format!("Invalid core count: {}", e)))?;
    }

    if let Some(messages) = matches.get_one::<String>("messages") {
        config.benchmark.messages = messages
            .parse()
            .map_err(|e| Error::config(format!("Invalid message count: {}", e)))?;
    }

    if let Some(capacity) = matches.get_one::<String>("capacity") {
        config.benchmark.capacity = capacity
            .parse()
            .map_err(|e| Error::config(format!("Invalid capacity: {}", e)))?;
    }

    if let Some(warmup) = matches.get_one::<String>("warmup") {
        config.benchmark.warmup_runs = warmup
            .parse()
            .map_err(|e| Error::config(format!("Invalid warm-up runs: {}", e)))?;
    }

    if let Some(timeout) = matches.get_one::<String>("timeout") {
        config.benchmark.wait_timeout = parse_duration(timeout)
            .map_err(|e| Error::config(format!("Invalid timeout: {}", e)))?;
    }

    if let Some(policy) = matches.get_one::<String>("on-error") {
        config.benchmark.on_error = policy.parse()?;
    }

    if let Some(format) = matches.get_one::<String>("format") {
        config.output.format = format.parse()?;
    }

    if let Some(path) = matches.get_one::<String>("metrics-file") {
        config.metrics.enabled = true;
        config.metrics.dump_path = Some(path.into());
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}

/// Parse `P,C` into a producer/consumer pair
fn parse_pair(s: &str) -> Result<(CoreId, CoreId)> {
    let (producer, consumer) = s
        .split_once(',')
        .ok_or_else(|| Error::config(format!("Invalid pair {:?}, expected P,C", s)))?;
    let parse = |v: &str| -> Result<CoreId> {
        v.trim()
            .parse::<usize>()
            .map(CoreId)
            .map_err(|e| Error::config(format!("Invalid core {:?}: {}", v, e)))
    };
    Ok((parse(producer)?, parse(consumer)?))
}
