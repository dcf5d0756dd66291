//! Background loops for the batch entry points.
//!
//! Two independent loops run on their own intervals:
//! - **Auto-download**: fulfils authorized requests
//! - **Import**: imports finished downloads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SchedulerConfig;

use super::AcquisitionPipeline;

/// Runs the pipeline's batch jobs periodically until stopped.
pub struct PipelineScheduler {
    pipeline: Arc<AcquisitionPipeline>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PipelineScheduler {
    pub fn new(pipeline: Arc<AcquisitionPipeline>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pipeline,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn both loops. Returns their handles; a second call is a no-op.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return Vec::new();
        }

        info!(
            import_interval_secs = self.config.import_interval_secs,
            auto_download_interval_secs = self.config.auto_download_interval_secs,
            "Starting scheduler"
        );

        vec![
            self.spawn_loop(
                "auto-download",
                Duration::from_secs(self.config.auto_download_interval_secs),
                |pipeline| async move {
                    pipeline.auto_download_approved_requests().await;
                },
            ),
            self.spawn_loop(
                "import",
                Duration::from_secs(self.config.import_interval_secs),
                |pipeline| async move {
                    pipeline.import_completed_downloads().await;
                },
            ),
        ]
    }

    /// Signal both loops to stop after their current run.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }
        info!("Stopping scheduler");
        let _ = self.shutdown_tx.send(());
    }

    fn spawn_loop<F, Fut>(&self, name: &'static str, period: Duration, job: F) -> JoinHandle<()>
    where
        F: Fn(Arc<AcquisitionPipeline>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(job = name, "Scheduler loop started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        job(Arc::clone(&pipeline)).await;
                    }
                }
            }
            info!(job = name, "Scheduler loop stopped");
        })
    }
}
