//! Sequential task runner with bounded retries.
//!
//! Tasks run in the order they were added. A task that still fails after its
//! retries is reported to the alert port, and every task after it is marked
//! `UpstreamFailed` without running.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::ports::{AlertPort, TaskAlert};
use crate::config::{EtlConfig, ScheduleConfig};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::tasks::{Stage, StageReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for RetryPolicy {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            retries: config.retries,
            retry_delay: config.retry_delay(),
        }
    }
}

pub type TaskFn = Box<dyn Fn() -> Result<StageReport> + Send + Sync>;

pub struct ScheduledTask {
    name: String,
    run: TaskFn,
}

impl ScheduledTask {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Result<StageReport> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Succeeded,
    Failed,
    UpstreamFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub task: String,
    pub state: TaskState,
    pub attempts: u32,
    pub error: Option<String>,
    pub report: Option<StageReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskRun>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Succeeded)
    }

    pub fn task(&self, name: &str) -> Option<&TaskRun> {
        self.tasks.iter().find(|t| t.task == name)
    }
}

pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    policy: RetryPolicy,
    alerts: Box<dyn AlertPort>,
}

impl Scheduler {
    pub fn new(policy: RetryPolicy, alerts: Box<dyn AlertPort>) -> Self {
        Self {
            tasks: Vec::new(),
            policy,
            alerts,
        }
    }

    pub fn with_task(mut self, task: ScheduledTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// bronze_ingestion >> silver_transformation >> gold_analytics
    pub fn superstore(config: &EtlConfig, alerts: Box<dyn AlertPort>) -> Self {
        let mut scheduler = Self::new(RetryPolicy::from(&config.schedule), alerts);
        for stage in Stage::ALL {
            let config = config.clone();
            scheduler = scheduler.with_task(ScheduledTask::new(stage.task_name(), move || {
                stage.run(&config)
            }));
        }
        scheduler
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(ScheduledTask::name).collect()
    }

    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting run with {} tasks", self.tasks.len());

        let mut runs = Vec::with_capacity(self.tasks.len());
        let mut upstream_failed = false;

        for task in &self.tasks {
            if upstream_failed {
                warn!(%run_id, task = %task.name, "Skipping task, an upstream task failed");
                runs.push(TaskRun {
                    task: task.name.clone(),
                    state: TaskState::UpstreamFailed,
                    attempts: 0,
                    error: None,
                    report: None,
                });
                continue;
            }

            let run = self.run_task(run_id, task).await;
            upstream_failed = run.state != TaskState::Succeeded;
            runs.push(run);
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tasks: runs,
        };
        if report.succeeded() {
            info!(%run_id, "Run completed successfully");
        } else {
            error!(%run_id, "Run failed");
        }
        report
    }

    async fn run_task(&self, run_id: Uuid, task: &ScheduledTask) -> TaskRun {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(%run_id, task = %task.name, attempt, "Running task");
            match (task.run)() {
                Ok(report) => {
                    return TaskRun {
                        task: task.name.clone(),
                        state: TaskState::Succeeded,
                        attempts: attempt,
                        error: None,
                        report: Some(report),
                    };
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        %run_id,
                        task = %task.name,
                        attempt,
                        "Task failed, retrying in {:?}: {}",
                        self.policy.retry_delay,
                        e
                    );
                    metrics::scheduler::task_retry(&task.name);
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => {
                    let message = e.to_string();
                    self.alerts.alert(&TaskAlert {
                        run_id: run_id.to_string(),
                        task: task.name.clone(),
                        attempts: attempt,
                        error: message.clone(),
                    });
                    return TaskRun {
                        task: task.name.clone(),
                        state: TaskState::Failed,
                        attempts: attempt,
                        error: Some(message),
                        report: None,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::error::EtlError;
    use crate::infra::memory::RecordingAlertPort;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant_policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            retry_delay: Duration::ZERO,
        }
    }

    fn ok_report(stage: &'static str) -> Result<StageReport> {
        Ok(StageReport {
            stage,
            rows_in: 1,
            rows_out: 1,
            artifacts: Vec::new(),
            notes: Vec::new(),
            duration_ms: 0,
        })
    }

    fn counting(counter: &Arc<AtomicU32>, fail_first: u32, stage: &'static str) -> ScheduledTask {
        let counter = counter.clone();
        ScheduledTask::new(stage, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < fail_first {
                Err(EtlError::Config(format!("attempt {} failed", n + 1)))
            } else {
                ok_report(stage)
            }
        })
    }

    #[tokio::test]
    async fn retries_then_alerts_and_skips_downstream() {
        let silver_calls = Arc::new(AtomicU32::new(0));
        let gold_calls = Arc::new(AtomicU32::new(0));
        let alerts = RecordingAlertPort::new();

        let scheduler = Scheduler::new(instant_policy(2), Box::new(alerts.clone()))
            .with_task(ScheduledTask::new(constants::BRONZE_TASK, || ok_report(constants::BRONZE_TASK)))
            .with_task(counting(&silver_calls, u32::MAX, constants::SILVER_TASK))
            .with_task(counting(&gold_calls, 0, constants::GOLD_TASK));

        let report = scheduler.run().await;
        assert!(!report.succeeded());

        let silver = report.task(constants::SILVER_TASK).unwrap();
        assert_eq!(silver.state, TaskState::Failed);
        assert_eq!(silver.attempts, 3);
        assert_eq!(silver_calls.load(Ordering::SeqCst), 3);
        assert_eq!(silver.error.as_deref(), Some("Configuration error: attempt 3 failed"));

        let gold = report.task(constants::GOLD_TASK).unwrap();
        assert_eq!(gold.state, TaskState::UpstreamFailed);
        assert_eq!(gold_calls.load(Ordering::SeqCst), 0);

        let sent = alerts.alerts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task, constants::SILVER_TASK);
        assert_eq!(sent[0].attempts, 3);
        assert_eq!(sent[0].run_id, report.run_id.to_string());
    }

    #[tokio::test]
    async fn task_that_recovers_lets_the_run_continue() {
        let bronze_calls = Arc::new(AtomicU32::new(0));
        let alerts = RecordingAlertPort::new();

        let scheduler = Scheduler::new(instant_policy(2), Box::new(alerts.clone()))
            .with_task(counting(&bronze_calls, 1, constants::BRONZE_TASK))
            .with_task(ScheduledTask::new(constants::SILVER_TASK, || ok_report(constants::SILVER_TASK)));

        let report = scheduler.run().await;
        assert!(report.succeeded());
        assert_eq!(report.task(constants::BRONZE_TASK).unwrap().attempts, 2);
        assert!(alerts.alerts().is_empty());
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new(instant_policy(0), Box::new(RecordingAlertPort::new()))
            .with_task(counting(&calls, u32::MAX, constants::GOLD_TASK));

        let report = scheduler.run().await;
        assert_eq!(report.tasks[0].attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn superstore_dag_runs_in_medallion_order() {
        let scheduler = Scheduler::superstore(&EtlConfig::default(), Box::new(RecordingAlertPort::new()));
        assert_eq!(
            scheduler.task_names(),
            vec!["bronze_ingestion", "silver_transformation", "gold_analytics"]
        );
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
        assert_eq!(RetryPolicy::default().retry_delay, Duration::from_secs(300));
    }

    #[test]
    fn run_report_serializes_task_states() {
        let report = RunReport {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            tasks: vec![TaskRun {
                task: constants::GOLD_TASK.to_string(),
                state: TaskState::UpstreamFailed,
                attempts: 0,
                error: None,
                report: None,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tasks"][0]["state"], "upstream_failed");
        assert_eq!(json["run_id"], "00000000-0000-0000-0000-000000000000");
    }
}
