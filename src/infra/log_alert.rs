use tracing::error;

use crate::app::ports::{AlertPort, TaskAlert};
use crate::observability::metrics;

/// Default alert channel: an error-level log line plus a failure counter
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertAdapter;

impl AlertPort for LogAlertAdapter {
    fn alert(&self, alert: &TaskAlert) {
        metrics::scheduler::task_terminal_failure(&alert.task);
        error!(
            run_id = %alert.run_id,
            task = %alert.task,
            attempts = alert.attempts,
            "Task failed after all retries: {}",
            alert.error
        );
    }
}
