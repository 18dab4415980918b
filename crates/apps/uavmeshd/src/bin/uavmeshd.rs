#[path = "uavmeshd/bootstrap.rs"]
mod bootstrap;
#[path = "uavmeshd/shutdown.rs"]
mod shutdown;

use clap::Parser;
use std::path::PathBuf;
use uavmesh_core::NodeConfig;

/// UAV mesh node control-plane daemon: DSR route discovery, neighbor
/// liveness, sink-side topology aggregation, and the video-transport
/// control plane in one process (spec.md §1).
#[derive(Parser, Debug)]
#[command(name = "uavmeshd", version)]
struct Args {
    /// Path to the node's key=value config file (spec.md §6).
    #[arg(long, env = "UAVMESHD_CONFIG", default_value = "/etc/uavmeshd/uav_config.txt")]
    config: PathBuf,

    /// `env_logger` filter, e.g. `info`, `uavmesh_dsr=debug`.
    #[arg(long, env = "UAVMESHD_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level)).init();

    let config = match NodeConfig::from_path(&args.config) {
        Ok(config) => config,
        Err(err) => {
            log::error!("failed to load config {}: {err}", args.config.display());
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    runtime.block_on(run(config));
}

async fn run(config: NodeConfig) {
    log::info!(
        "uavmeshd starting: my_ip={} role={:?} sink_ip={}",
        config.my_ip, config.role, config.sink_ip
    );

    let node = match bootstrap::bootstrap(config).await {
        Ok(node) => node,
        Err(err) => {
            log::error!("bootstrap failed: {err}");
            std::process::exit(1);
        }
    };

    shutdown::wait_for_shutdown_key(node.stoppable.clone()).await;
    node.stoppable.stop();

    log::info!("uavmeshd stopping: joining {} tasks", node.tasks.len());
    for task in node.tasks.into_iter().rev() {
        if let Err(err) = task.await {
            log::warn!("task join failed: {err}");
        }
    }
    log::info!("uavmeshd stopped");
}
