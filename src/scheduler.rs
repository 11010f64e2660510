use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::pipeline::{PassReport, Pipeline};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FullScan,
    FastStockCheck,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::FullScan => "full_scan",
            TaskKind::FastStockCheck => "fast_stock_check",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running { started_at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Completed(Vec<PassReport>),
    SkippedAlreadyRunning,
    RejectedShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Every task kind reached `Idle` within the grace period.
    pub drained: bool,
    pub abandoned: Vec<TaskKind>,
}

#[derive(Debug)]
struct Registry {
    accepting: bool,
    states: HashMap<TaskKind, TaskState>,
}

struct Shared {
    pipeline: Pipeline,
    registry: Mutex<Registry>,
    idle: Notify,
    cancel: CancellationToken,
    stock_ticks: AtomicU64,
    last_reports: Mutex<HashMap<TaskKind, Vec<PassReport>>>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running_kinds(&self) -> Vec<TaskKind> {
        let registry = self.registry();
        let mut kinds: Vec<TaskKind> = registry
            .states
            .iter()
            .filter(|(_, state)| matches!(state, TaskState::Running { .. }))
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }
}

/// Marks a task kind `Running` for as long as it lives.
struct RunGuard {
    shared: Arc<Shared>,
    kind: TaskKind,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.shared.registry().states.insert(self.kind, TaskState::Idle);
        self.shared.idle.notify_waiters();
    }
}

enum Admission {
    Admitted(RunGuard),
    AlreadyRunning,
    ShuttingDown,
}

/// Owns the two periodic passes, keeps each task kind single-flight and
/// drains in-flight work on shutdown.
#[derive(Clone)]
pub struct RunCoordinator {
    shared: Arc<Shared>,
    scheduler: Arc<tokio::sync::Mutex<Option<JobScheduler>>>,
    config: SchedulerConfig,
}

impl RunCoordinator {
    pub fn new(pipeline: Pipeline, config: SchedulerConfig) -> Self {
        let states = [TaskKind::FullScan, TaskKind::FastStockCheck]
            .into_iter()
            .map(|kind| (kind, TaskState::Idle))
            .collect();

        Self {
            shared: Arc::new(Shared {
                pipeline,
                registry: Mutex::new(Registry {
                    accepting: true,
                    states,
                }),
                idle: Notify::new(),
                cancel: CancellationToken::new(),
                stock_ticks: AtomicU64::new(0),
                last_reports: Mutex::new(HashMap::new()),
            }),
            scheduler: Arc::new(tokio::sync::Mutex::new(None)),
            config,
        }
    }

    /// Registers both interval jobs and kicks off one full scan right away.
    pub async fn start(&self) -> Result<(), AppError> {
        let mut scheduler = JobScheduler::new().await.map_err(scheduler_error)?;

        for (kind, interval) in [
            (TaskKind::FullScan, self.config.full_scan_interval()),
            (TaskKind::FastStockCheck, self.config.stock_check_interval()),
        ] {
            let coordinator = self.clone();
            let job = Job::new_repeated_async(interval, move |_uuid, _l| {
                let coordinator = coordinator.clone();
                Box::pin(async move {
                    coordinator.trigger(kind).await;
                })
            })
            .map_err(scheduler_error)?;

            scheduler.add(job).await.map_err(scheduler_error)?;
            tracing::info!(kind = %kind, interval_secs = interval.as_secs(), "Scheduled task");
        }

        scheduler.start().await.map_err(scheduler_error)?;
        *self.scheduler.lock().await = Some(scheduler);

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.trigger(TaskKind::FullScan).await;
        });

        tracing::info!("Run coordinator started");
        Ok(())
    }

    /// Runs one pass of `kind` unless one is already in flight or shutdown has begun.
    ///
    /// Overlapping triggers are dropped, never queued.
    pub async fn trigger(&self, kind: TaskKind) -> TriggerOutcome {
        let _guard = match self.admit(kind) {
            Admission::Admitted(guard) => guard,
            Admission::AlreadyRunning => {
                tracing::debug!(kind = %kind, "Task still running, trigger dropped");
                metrics::counter!("triggers_skipped_total", "kind" => kind.as_str()).increment(1);
                return TriggerOutcome::SkippedAlreadyRunning;
            }
            Admission::ShuttingDown => {
                tracing::debug!(kind = %kind, "Shutting down, trigger rejected");
                return TriggerOutcome::RejectedShuttingDown;
            }
        };

        tracing::info!(kind = %kind, "Task started");
        let cancel = &self.shared.cancel;
        let reports = match kind {
            TaskKind::FullScan => self.shared.pipeline.run_full_scan(cancel).await,
            TaskKind::FastStockCheck => {
                let tick = self.shared.stock_ticks.fetch_add(1, Ordering::SeqCst);
                self.shared.pipeline.run_stock_check(tick, cancel).await
            }
        };

        let failed = reports.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            tracing::warn!(kind = %kind, failed, groups = reports.len(), "Task finished with failed groups");
        } else {
            tracing::info!(kind = %kind, groups = reports.len(), "Task finished");
        }

        self.shared
            .last_reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, reports.clone());

        TriggerOutcome::Completed(reports)
    }

    /// Stops new triggers, waits up to `grace` for running tasks, then releases
    /// the collaborators. Tasks still running after `grace` are abandoned.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownSummary {
        self.shared.registry().accepting = false;
        self.shared.cancel.cancel();
        tracing::info!(grace_secs = grace.as_secs(), "Run coordinator shutting down");

        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            if let Err(e) = scheduler.shutdown().await {
                tracing::warn!(error = ?e, "Job scheduler did not shut down cleanly");
            }
        }

        let deadline = tokio::time::Instant::now() + grace;
        let summary = loop {
            // Register interest before looking, so a wake-up in between is not lost
            let notified = self.shared.idle.notified();

            let running = self.shared.running_kinds();
            if running.is_empty() {
                break ShutdownSummary {
                    drained: true,
                    abandoned: Vec::new(),
                };
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let abandoned = self.shared.running_kinds();
                break ShutdownSummary {
                    drained: abandoned.is_empty(),
                    abandoned,
                };
            }
        };

        if !summary.drained {
            tracing::warn!(abandoned = ?summary.abandoned, "Grace period elapsed, abandoning running tasks");
        }

        self.shared.pipeline.release().await;
        tracing::info!("Run coordinator stopped");
        summary
    }

    pub fn state(&self, kind: TaskKind) -> TaskState {
        self.shared
            .registry()
            .states
            .get(&kind)
            .copied()
            .unwrap_or(TaskState::Idle)
    }

    /// Reports of the most recent completed pass of `kind`.
    pub fn last_report(&self, kind: TaskKind) -> Option<Vec<PassReport>> {
        self.shared
            .last_reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    fn admit(&self, kind: TaskKind) -> Admission {
        let mut registry = self.shared.registry();
        if !registry.accepting {
            return Admission::ShuttingDown;
        }

        if matches!(registry.states.get(&kind), Some(TaskState::Running { .. })) {
            return Admission::AlreadyRunning;
        }

        registry.states.insert(
            kind,
            TaskState::Running {
                started_at: Utc::now(),
            },
        );
        Admission::Admitted(RunGuard {
            shared: Arc::clone(&self.shared),
            kind,
        })
    }
}

fn scheduler_error<E: fmt::Debug>(e: E) -> AppError {
    AppError::Scheduler(format!("{e:?}"))
}
