// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod word_search;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use word_search::{WordCountTask, WordCounts};
use work_manager_core::{
    AtomicShutdownSignal, ShutdownSignal, TaskFuture, WorkManager, WorkManagerMode,
};
use work_manager_tcp::{TcpConfig, TcpRole, TcpWorkManager};
use work_manager_threads::{SerialWorkManager, ThreadConfig, ThreadWorkManager};

const EXIT_INTERRUPTED: i32 = 130;
/// How often the merge loop rechecks for Ctrl+C while no chunk completes
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ManagerKind {
    Serial,
    #[default]
    Threads,
    Tcp,
}

#[derive(Parser)]
#[command(name = "work-manager-demo")]
#[command(about = "Word search map/reduce driven through a work manager", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Overrides the configured work manager
    #[arg(long, value_enum)]
    manager: Option<ManagerKind>,
    /// Overrides the number of worker threads
    #[arg(long)]
    workers: Option<usize>,
    /// Overrides the TCP role (master or worker)
    #[arg(long)]
    role: Option<TcpRole>,
    /// Overrides the TCP address
    #[arg(long)]
    address: Option<String>,
    /// Arguments handed to the work manager
    #[arg(last = true)]
    aux_args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    manager: ManagerKind,
    threads: ThreadConfig,
    tcp: TcpConfig,
    num_strings: usize,
    max_string_length: usize,
    num_target_words: usize,
    target_word_length: usize,
    partition_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manager: ManagerKind::default(),
            threads: ThreadConfig::default(),
            tcp: TcpConfig::default(),
            num_strings: 1_000_000,
            max_string_length: 20,
            num_target_words: 100,
            target_word_length: 3,
            partition_size: 10_000,
        }
    }
}

impl Config {
    fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(manager) = cli.manager {
            self.manager = manager;
        }
        if let Some(workers) = cli.workers {
            self.threads.n_workers = workers;
        }
        if let Some(role) = cli.role {
            self.tcp.role = role;
        }
        if let Some(address) = &cli.address {
            self.tcp.address = address.clone();
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            warn!("{:#}; using default configuration", error);
            Config::default()
        }
    };
    config.apply(&cli);

    let shutdown = AtomicShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        if handler_signal.is_cancelled() {
            warn!("second Ctrl+C received, exiting");
            process::exit(EXIT_INTERRUPTED);
        }
        warn!("Ctrl+C received, stopping; press again to exit immediately");
        handler_signal.shutdown();
    })
    .context("installing Ctrl+C handler")?;

    let aux_args = cli.aux_args.clone();
    let exit_code = match config.manager {
        ManagerKind::Serial => drive(SerialWorkManager::new(), &config, &shutdown, aux_args)?,
        ManagerKind::Threads => drive(
            ThreadWorkManager::new(config.threads.clone()),
            &config,
            &shutdown,
            aux_args,
        )?,
        ManagerKind::Tcp => drive(
            TcpWorkManager::new(config.tcp.clone()),
            &config,
            &shutdown,
            aux_args,
        )?,
    };

    if exit_code != 0 {
        process::exit(exit_code);
    }
    Ok(())
}

/// Runs the word search on `manager`. Returns the process exit code.
fn drive<M>(
    mut manager: M,
    config: &Config,
    shutdown: &AtomicShutdownSignal,
    aux_args: Vec<String>,
) -> Result<i32>
where
    M: WorkManager<WordCountTask>,
{
    let unused = manager.parse_aux_args(aux_args);
    if !unused.is_empty() {
        warn!(?unused, "ignoring unrecognized work manager arguments");
    }

    let mode = manager.startup().context("starting work manager")?;
    if mode == WorkManagerMode::Worker {
        info!("worker released by master");
        return Ok(0);
    }

    let start_time = Instant::now();
    println!("=== WORK MANAGER WORD SEARCH ===");
    println!("Configuration:");
    println!("  - Manager: {:?}", config.manager);
    println!("  - Strings: {}", config.num_strings);
    println!("  - Max string length: {}", config.max_string_length);
    println!("  - Target words: {}", config.num_target_words);
    println!("  - Target word length: {}", config.target_word_length);
    println!("  - Partition size: {}", config.partition_size);

    let mut rng = rand::rng();
    let data: Vec<String> = (0..config.num_strings)
        .map(|_| word_search::generate_random_string(&mut rng, config.max_string_length))
        .collect();
    let targets: Vec<String> = (0..config.num_target_words)
        .map(|_| word_search::generate_target_word(&mut rng, config.target_word_length))
        .collect();

    let tasks = word_search::partition(&data, &targets, config.partition_size);
    info!(chunks = tasks.len(), "submitting tasks");
    let futures = manager.submit_many(tasks).context("submitting tasks")?;

    let summary = merge_completed(&manager, &futures, shutdown, POLL_INTERVAL);
    let exit_code = if summary.interrupted {
        EXIT_INTERRUPTED
    } else {
        0
    };
    manager.shutdown(exit_code);
    info!(
        merged = summary.merged,
        failed = summary.failed,
        "merged partial results"
    );

    println!("\n=== RESULTS ===");
    let ranked = word_search::ranked(&summary.totals);
    for (word, count) in ranked.iter().take(20) {
        println!("{}: {}", word, count);
    }
    if ranked.len() > 20 {
        println!("... ({} more words)", ranked.len() - 20);
    }
    let total_occurrences: u64 = ranked.iter().map(|(_, count)| count).sum();
    println!("\nTotal occurrences found: {}", total_occurrences);
    println!("Total time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(exit_code)
}

#[derive(Debug, Default)]
struct MergeSummary {
    totals: WordCounts,
    merged: usize,
    failed: usize,
    interrupted: bool,
}

/// Merges chunk counts in completion order until every future is done or
/// `shutdown` fires. Waits in slices of `poll_interval` so a shutdown is
/// noticed even while no chunk completes.
fn merge_completed<M, S>(
    manager: &M,
    futures: &[TaskFuture<WordCounts>],
    shutdown: &S,
    poll_interval: Duration,
) -> MergeSummary
where
    M: WorkManager<WordCountTask>,
    S: ShutdownSignal,
{
    let mut summary = MergeSummary::default();
    let mut pending = futures.to_vec();
    let mut seen = HashSet::new();

    while !pending.is_empty() {
        if shutdown.is_cancelled() {
            summary.interrupted = true;
            break;
        }
        for future in manager.as_completed_timeout(&pending, poll_interval) {
            seen.insert(future.task_id());
            match future.get_result() {
                Ok(partial) => {
                    word_search::merge(&mut summary.totals, &partial);
                    summary.merged += 1;
                }
                Err(error) => {
                    warn!(task_id = %future.task_id(), %error, "chunk failed");
                    summary.failed += 1;
                }
            }
            if shutdown.is_cancelled() {
                break;
            }
        }
        pending.retain(|future| !seen.contains(&future.task_id()));
    }
    summary
}
