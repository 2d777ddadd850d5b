use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::settlement::processor::SettlementProcessor;

/// Time between settlement passes
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

struct RunningCycle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs the settlement processor on a fixed cadence. `start` and `stop` are
/// idempotent; cancellation is honored between trades, never mid-trade.
pub struct SettlementScheduler {
    processor: Arc<SettlementProcessor>,
    running: Mutex<Option<RunningCycle>>,
}

impl SettlementScheduler {
    pub fn new(processor: Arc<SettlementProcessor>) -> Self {
        Self {
            processor,
            running: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            warn!("Settlement scheduler already running, ignoring start");
            return;
        }

        info!("🚀 Starting settlement scheduler (every {:?})", POLL_INTERVAL);

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cancel = shutdown_rx.clone();
        let processor = self.processor.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(POLL_INTERVAL);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *cancel.borrow() {
                            break;
                        }
                        if let Err(e) = processor.run_cycle(&cancel).await {
                            error!("❌ Settlement cycle failed: {:?}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("🛑 Settlement scheduler stopped");
        });

        *running = Some(RunningCycle { shutdown, task });
    }

    /// Signal the ticker and wait for it to wind down. A cycle in progress
    /// finishes its current trade first.
    pub async fn stop(&self) {
        let cycle = self.running.lock().take();

        match cycle {
            Some(cycle) => {
                info!("🛑 Stopping settlement scheduler");
                let _ = cycle.shutdown.send(true);
                if let Err(e) = cycle.task.await {
                    error!("Settlement scheduler task ended abnormally: {:?}", e);
                }
            }
            None => {
                warn!("Settlement scheduler not running, ignoring stop");
            }
        }
    }
}
