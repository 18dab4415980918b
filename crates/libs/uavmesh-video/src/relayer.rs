//! `VideoRelayer` (spec.md §4.13): the opaque per-stream relay task. The
//! actual pull/decode/republish pipeline is out of scope (spec.md §1
//! Non-goals name it explicitly); what's in scope is the lifecycle
//! contract a pipeline plugs into — enter `PublishingList` before it
//! starts moving frames, leave it on exit, and on an abnormal exit also
//! push its URL onto `LostList`.
//!
//! Grounded in `original_source/video_stream.cpp`'s `VideoRelayer`: a
//! heartbeat counter reset on every successful frame read, a sweeper that
//! increments it by wall-clock elapsed time and force-quits stalled
//! relayers via a "quit block" flag read by an interrupt callback. The
//! interrupt callback itself is FFI into libavformat and has no Rust
//! analogue here; `quit_block` is exposed so a real pipeline's
//! equivalent poll point can check it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::lists::{LostList, PublishingList};

/// Default relay stall timeout (spec.md §4.13 references `RELAY_TIMEOUT_MS`
/// but never pins a value in the retrieved sources either). 10 seconds
/// comfortably exceeds the sweeper's ~3s tick so a single missed tick
/// doesn't spuriously trip it.
pub const RELAY_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Cancelled cooperatively (stop requested or heartbeat swept).
    Stopped,
    /// The pull side broke on its own; the relayer's URL should be added
    /// to `LostList` (spec.md §4.13 relayer lifecycle contract).
    BrokenPull,
}

/// Heartbeat shared between a running relayer and the sweeper that times
/// it out. `reset` is called by the pipeline on every frame it
/// successfully reads; `tick` is called by the sweeper with the elapsed
/// wall-clock delta.
#[derive(Debug, Default)]
pub struct Heartbeat {
    millis_since_reset: AtomicU64,
}

impl Heartbeat {
    pub fn reset(&self) {
        self.millis_since_reset.store(0, Ordering::Relaxed);
    }

    pub fn tick(&self, elapsed_ms: u64) -> u64 {
        self.millis_since_reset.fetch_add(elapsed_ms, Ordering::Relaxed) + elapsed_ms
    }

    pub fn is_stalled(&self, timeout_ms: u64) -> bool {
        self.millis_since_reset.load(Ordering::Relaxed) > timeout_ms
    }
}

/// The pluggable pull/decode/republish pipeline. Production code supplies
/// a real implementation backed by a media library; tests use
/// [`NullRelayerEngine`].
#[async_trait]
pub trait RelayerEngine: Send + Sync {
    async fn relay(&self, pull_url: &str, publish_url: &str, heartbeat: &Heartbeat, quit_block: &AtomicBool) -> RelayOutcome;
}

/// A relayer engine that does no real I/O: it marks itself published,
/// beats its own heartbeat once, then waits for `quit_block` to be set.
/// Stands in for the real media pipeline in tests, matching the spec's
/// treatment of the relayer as opaque apart from its lifecycle contract.
pub struct NullRelayerEngine;

#[async_trait]
impl RelayerEngine for NullRelayerEngine {
    async fn relay(&self, _pull_url: &str, _publish_url: &str, heartbeat: &Heartbeat, quit_block: &AtomicBool) -> RelayOutcome {
        heartbeat.reset();
        while !quit_block.load(Ordering::Relaxed) {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        RelayOutcome::Stopped
    }
}

/// A handle to a spawned relayer task: the sweeper reads/writes its
/// heartbeat and quit-block, the controller joins it on `stop`/`lost`.
pub struct RelayerHandle {
    heartbeat: Arc<Heartbeat>,
    quit_block: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<RelayOutcome>,
}

impl RelayerHandle {
    /// Spawns the relayer task, enforcing the lifecycle contract around
    /// whatever `engine` does: `publish_url` enters `publishing` before
    /// the engine starts moving frames and leaves it once the engine
    /// returns; a `BrokenPull` outcome additionally pushes `publish_url`
    /// onto `lost` (spec.md §4.13). Centralizing this here means every
    /// `RelayerEngine` impl — including test doubles — gets the contract
    /// for free instead of having to reimplement it.
    pub fn spawn(
        engine: Arc<dyn RelayerEngine>,
        pull_url: String,
        publish_url: String,
        publishing: Arc<PublishingList>,
        lost: Arc<LostList>,
    ) -> Self {
        let heartbeat = Arc::new(Heartbeat::default());
        let quit_block = Arc::new(AtomicBool::new(false));

        let task = {
            let heartbeat = heartbeat.clone();
            let quit_block = quit_block.clone();
            tokio::spawn(async move {
                publishing.add(publish_url.clone());
                let outcome = engine.relay(&pull_url, &publish_url, &heartbeat, &quit_block).await;
                publishing.remove(&publish_url);
                if outcome == RelayOutcome::BrokenPull {
                    lost.add(publish_url);
                }
                outcome
            })
        };

        RelayerHandle { heartbeat, quit_block, task }
    }

    pub fn record_heartbeat_tick(&self, elapsed_ms: u64) -> u64 {
        self.heartbeat.tick(elapsed_ms)
    }

    pub fn is_stalled(&self, timeout_ms: u64) -> bool {
        self.heartbeat.is_stalled(timeout_ms)
    }

    /// Forces the relayer's blocking pull to unblock (spec.md §4.13
    /// sweeper: "set that relayer's quit-block flag").
    pub fn force_quit(&self) {
        self.quit_block.store(true, Ordering::Relaxed);
    }

    /// Requests cancellation and waits for the relayer task to finish.
    pub async fn stop(self) -> RelayOutcome {
        self.force_quit();
        self.task.await.unwrap_or(RelayOutcome::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn force_quit_unblocks_null_engine() {
        let publishing = Arc::new(PublishingList::new());
        let lost = Arc::new(LostList::new());
        let publish_url = "rtsp://192.168.2.100:8554/vs01".to_string();
        let handle = RelayerHandle::spawn(
            Arc::new(NullRelayerEngine),
            "rtsp://192.168.2.101:8554/vs01".to_string(),
            publish_url.clone(),
            publishing.clone(),
            lost,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(publishing.contains(&publish_url));

        let outcome = tokio::time::timeout(Duration::from_secs(1), handle.stop()).await.expect("relayer should stop promptly");
        assert_eq!(outcome, RelayOutcome::Stopped);
        assert!(!publishing.contains(&publish_url));
    }

    #[test]
    fn heartbeat_reports_stalled_past_timeout() {
        let heartbeat = Heartbeat::default();
        heartbeat.tick(5_000);
        assert!(!heartbeat.is_stalled(RELAY_TIMEOUT_MS));
        heartbeat.tick(6_000);
        assert!(heartbeat.is_stalled(RELAY_TIMEOUT_MS));
    }

    #[test]
    fn reset_clears_accumulated_heartbeat() {
        let heartbeat = Heartbeat::default();
        heartbeat.tick(RELAY_TIMEOUT_MS + 1);
        heartbeat.reset();
        assert!(!heartbeat.is_stalled(RELAY_TIMEOUT_MS));
    }
}
