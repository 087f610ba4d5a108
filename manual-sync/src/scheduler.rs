use crate::engine::RunSummary;
use crate::service::SyncService;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Cron-driven synchronization. At most one pass runs at a time; a tick that
/// fires while a pass is still running is skipped.
pub struct SyncScheduler {
    scheduler: Mutex<JobScheduler>,
    service: Arc<SyncService>,
    max_files: Option<usize>,
    running: Arc<Mutex<()>>,
}

impl SyncScheduler {
    pub async fn new(service: Arc<SyncService>, max_files: Option<usize>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            service,
            max_files,
            running: Arc::new(Mutex::new(())),
        })
    }

    pub async fn schedule(&self, cron_expression: &str) -> anyhow::Result<()> {
        let service = self.service.clone();
        let running = self.running.clone();
        let max_files = self.max_files;

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let service = service.clone();
            let running = running.clone();
            Box::pin(async move {
                tracing::info!("Starting scheduled synchronization");
                run_exclusive(&service, &running, max_files).await;
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = %cron_expression, "Synchronization scheduled");
        Ok(())
    }

    /// Run a pass immediately, subject to the same exclusivity as scheduled ticks.
    pub async fn run_now(&self) -> Option<RunSummary> {
        run_exclusive(&self.service, &self.running, self.max_files).await
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    /// Stop firing new ticks, then wait for a pass already in flight.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let stopped = self.scheduler.lock().await.shutdown().await;
        self.wait_idle().await;
        stopped?;
        Ok(())
    }

    /// Resolve once no pass is running. Holding the guard until return keeps a
    /// late tick from starting in between.
    pub async fn wait_idle(&self) {
        let _idle = self.running.lock().await;
        tracing::debug!("No synchronization in flight");
    }
}

async fn run_exclusive(
    service: &SyncService,
    running: &Mutex<()>,
    max_files: Option<usize>,
) -> Option<RunSummary> {
    let Ok(_guard) = running.try_lock() else {
        tracing::warn!("Skipping scheduled run: sync already running");
        return None;
    };

    match service.run(max_files).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!(error = %e, "Scheduled synchronization failed");
            None
        }
    }
}
