use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

/// Timing record for one flow invocation, emitted on the `engine.timing`
/// target so the dedicated timing log picks it up.
#[derive(Debug)]
pub struct FlowTimer {
    task: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
}

impl FlowTimer {
    pub fn start(task: &str) -> Self {
        let timer = FlowTimer {
            task: task.to_string(),
            started_at: Utc::now(),
            started_perf: Instant::now(),
        };
        info!(
            target: "engine.timing",
            "event=flow_started task={} started_at={}",
            timer.task,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn complete(
        self,
        terminal_state: &str,
        tool_rounds: usize,
        tool_calls: usize,
        error: Option<String>,
    ) {
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: "engine.timing",
            "event=flow_completed task={} started_at={} completed_at={} duration_s={:.3} state={} tool_rounds={} tool_calls={} error={}",
            self.task,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            terminal_state,
            tool_rounds,
            tool_calls,
            error.unwrap_or_default()
        );
    }
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    call: F,
) -> Result<T, crate::flow::FlowError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, crate::flow::FlowError>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    info!(
        target: "engine.timing",
        "event=llm_request provider={} model={} operation={} started_at={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339()
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "engine.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status
    );

    result
}
