//! Periodic driver for [`TaskOrchestrationService::run_scheduler_tick`].

use super::orchestration::TaskOrchestrationService;
use crate::task::ports::{EventBus, TaskExecutor, TaskRepository};
use mockable::Clock;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Runs scheduler ticks on a fixed interval until told to stop.
pub struct SchedulerTicker<R, B, X, C>
where
    R: TaskRepository + 'static,
    B: EventBus + 'static,
    X: TaskExecutor + 'static,
    C: Clock + Send + Sync + 'static,
{
    service: TaskOrchestrationService<R, B, X, C>,
    period: Duration,
}

impl<R, B, X, C> SchedulerTicker<R, B, X, C>
where
    R: TaskRepository + 'static,
    B: EventBus + 'static,
    X: TaskExecutor + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a ticker; periods below one millisecond are raised to it.
    #[must_use]
    pub fn new(service: TaskOrchestrationService<R, B, X, C>, period: Duration) -> Self {
        Self {
            service,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Ticks until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Ticks missed while a previous tick was still running are skipped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(period = ?self.period, "scheduler ticker started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = self.service.clock().utc();
                    let dispatched = self.service.run_scheduler_tick(now).await;
                    tracing::trace!(%now, dispatched = dispatched.len(), "scheduler tick");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler ticker stopped");
    }

    /// Runs the ticker on a spawned task.
    #[must_use]
    pub fn spawn(self) -> TickerHandle {
        let (sender, receiver) = watch::channel(false);
        let join = tokio::spawn(self.run(receiver));
        TickerHandle {
            shutdown: sender,
            join,
        }
    }
}

/// Handle to a spawned [`SchedulerTicker`].
#[derive(Debug)]
pub struct TickerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TickerHandle {
    /// Signals the ticker to stop and waits for it to finish.
    ///
    /// A tick already in progress runs to completion first.
    pub async fn stop(self) {
        if self.shutdown.send(true).is_err() {
            tracing::debug!("scheduler ticker already stopped");
        }
        if let Err(err) = self.join.await {
            tracing::warn!(error = %err, "scheduler ticker ended abnormally");
        }
    }
}
