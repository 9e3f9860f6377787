use std::process::exit;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use workpool::{PoolConfig, Result, WorkPool};

#[derive(Parser)]
#[command(
    name = "workpool-demo",
    version,
    about = "Drives a worker pool with a batch of sleeping tasks"
)]
struct Cli {
    /// Number of core workers kept alive when idle
    #[arg(long, default_value_t = 2)]
    core: usize,

    /// Maximum number of workers (defaults to the CPU count)
    #[arg(long)]
    max: Option<usize>,

    /// Keep-alive for surplus idle workers, in milliseconds
    #[arg(long, default_value_t = 5000)]
    keep_alive_ms: u64,

    /// Per-worker queue capacity
    #[arg(long, default_value_t = 5)]
    queue_capacity: usize,

    /// Minimum idle workers held in reserve
    #[arg(long, default_value_t = 1)]
    min_spare: usize,

    /// Number of tasks to submit
    #[arg(long, default_value_t = 20)]
    tasks: usize,

    /// Per-task simulated work, in milliseconds
    #[arg(long, default_value_t = 2000)]
    task_ms: u64,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let max = cli.max.unwrap_or_else(num_cpus::get).max(cli.core);
    let config = PoolConfig::new(
        cli.core,
        max,
        Duration::from_millis(cli.keep_alive_ms),
        cli.queue_capacity,
        cli.min_spare,
    );
    let pool = WorkPool::new(config)?;

    info!("workpool-demo {}", env!("CARGO_PKG_VERSION"));
    info!(
        "pool: core={} max={} keep_alive={}ms queue_capacity={} min_spare={}",
        cli.core, max, cli.keep_alive_ms, cli.queue_capacity, cli.min_spare
    );
    info!("submitting {} task(s) of {}ms each", cli.tasks, cli.task_ms);

    let task_ms = cli.task_ms;
    let futures: Vec<_> = (0..cli.tasks)
        .map(|i| {
            pool.submit(move || {
                let name = thread::current().name().map(str::to_owned);
                info!("task {} running on {:?}", i, name);
                thread::sleep(Duration::from_millis(task_ms));
                i
            })
        })
        .collect();

    let mut completed = 0;
    for (i, future) in futures.into_iter().enumerate() {
        match future.wait() {
            Ok(_) => completed += 1,
            Err(e) => warn!("task {} did not complete: {}", i, e),
        }
    }

    info!(
        "all tasks completed ({} of {}), workers live: {}",
        completed,
        cli.tasks,
        pool.worker_count()
    );
    pool.shutdown();

    Ok(())
}
