//! The `q`/`Q` stdin shutdown key (spec.md §4.14, §6). A blocking
//! `std::io::stdin` read can't be cancelled by a tokio timeout, so it
//! gets its own OS thread; seeing `q` or `Q` calls `Stoppable::stop()`,
//! which is the same flag every other task already selects on.

use std::io::BufRead;
use std::sync::Arc;
use uavmesh_core::Stoppable;

/// Spawns the stdin-reading thread and blocks the calling async task
/// until `stop()` is observed, whether it came from this key or from
/// somewhere else (a task panicking out, a future signal handler).
pub(super) async fn wait_for_shutdown_key(stoppable: Arc<Stoppable>) {
    let reader_stoppable = stoppable.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "q" | "Q") {
                log::info!("shutdown key pressed");
                reader_stoppable.stop();
                return;
            }
        }
    });

    stoppable.wait_for_stop().await;
}
