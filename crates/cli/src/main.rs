//! fileactivityd - storage activity watcher daemon

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use activity::{Consumer, RotatingLog};
use inventory::{select_mounts, SelectOptions};
use watcher::{
    ensure_watch_capacity, enumerate_watch_dirs, ExclusionFilter, FsWatcher, ProcFdCensus,
    ProcSysctl,
};

mod config;

use config::ActivityConfig;

/// Watch storage mountpoints and record filesystem activity
#[derive(Parser)]
#[command(name = "fileactivityd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sets log level to debug
    #[arg(long)]
    debug: bool,

    /// Configuration file location
    #[arg(long, default_value = config::CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = ActivityConfig::load(&cli.config)?;
    if !config.enable {
        info!("file activity watcher is disabled, exiting");
        return Ok(());
    }

    info!("starting file activity watcher");

    let filters = ExclusionFilter::compile(&config.exclusions)?;

    // Inventory: array and pool members are required, removable media is
    // optional coverage.
    let disks = inventory::disks_ini::load(Path::new(config::DISKS_INI_PATH))?;
    let removable = if config.unassigned_devices {
        inventory::removable::load(Path::new(config::REMOVABLE_DEVICES_PATH))
    } else {
        info!("removable devices monitoring is disabled");
        Vec::new()
    };
    let mounts = select_mounts(
        &disks,
        &removable,
        &SelectOptions {
            include_ssd: config.ssd,
            include_cache: config.cache,
        },
    );

    let watch_dirs = enumerate_watch_dirs(&mounts, &filters);

    // Raise the kernel watch ceiling before registering anything.
    ensure_watch_capacity(watch_dirs.len(), &ProcFdCensus::new(), &ProcSysctl::new())?;

    let (mut fs_watcher, events, faults) = FsWatcher::new()?;

    let log = RotatingLog::open(Path::new(config::ACTIVITY_LOG_PATH), config.max_records)?;
    let consumer = Consumer::new(events, faults, log, Box::new(ProcSysctl::new()));

    // The consumer starts before registration so the channels are being
    // drained by the time events flow.
    let consumer_task = tokio::spawn(consumer.run());

    let registered = fs_watcher.watch_all(&watch_dirs);
    info!(count = registered, "watcher ready");

    // The consumer never completes in normal operation; this await keeps
    // the process alive until it is killed externally, and propagates the
    // one fatal mid-run condition (log reopen failure) as a non-zero exit.
    consumer_task.await??;
    Ok(())
}
