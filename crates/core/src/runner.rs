//! Background lookup workers.
//!
//! [`LookupRunner::spawn`] runs one session's automation on a tokio task and
//! returns immediately. The worker:
//!
//! 1. waits for a slot in the bounded worker pool,
//! 2. builds a fresh [`Console`] with the session's answers substituted for
//!    interactive input and its output captured onto the status channel,
//! 3. runs the automation under the session's cancellation token and the
//!    configured timeout,
//! 4. extracts the CRM reference from the captured output.
//!
//! Every path ends with exactly one [`LookupOutcome`] on the result channel.
//! There are no retries; a failed lookup needs a new session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::LookupConfig;
use crate::console::{
    CaptureLog, Console, DetachedInput, InputSource, OutputSink, StatusSender, TracingSink,
};
use crate::domain::lookup::{LookupOutcome, LookupRequest};
use crate::extraction::{debug_excerpt, extract_reference, preview};
use crate::session::{SessionHandle, SessionId, WorkerChannels};

pub const STARTING_MESSAGE: &str = "Starting agent...";
pub const WAITING_FOR_WORKER: &str = "Waiting for an available lookup worker...";
pub const REFERENCE_NOT_FOUND: &str = "Could not find CRM reference number in agent output";
pub const LOOKUP_CANCELLED: &str = "Lookup cancelled before completion";

/// Long-running procedure that finds a customer's CRM reference.
///
/// Implementations ask for their inputs (customer id, username, password, in
/// that order) through [`Console::prompt`] and report progress, including the
/// reference itself, through [`Console::println`].
#[async_trait]
pub trait LookupAutomation: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, console: &Console) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunnerLimits {
    pub max_concurrent: usize,
    pub timeout: Duration,
}

impl From<&LookupConfig> for RunnerLimits {
    fn from(config: &LookupConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

pub struct LookupRunner {
    automation: Arc<dyn LookupAutomation>,
    permits: Arc<Semaphore>,
    limits: RunnerLimits,
    base_input: Arc<dyn InputSource>,
    base_output: Arc<dyn OutputSink>,
}

enum RunEnd {
    Finished,
    Failed(String),
    TimedOut,
    Cancelled,
}

impl LookupRunner {
    pub fn new(automation: Arc<dyn LookupAutomation>, limits: RunnerLimits) -> Self {
        Self {
            automation,
            permits: Arc::new(Semaphore::new(limits.max_concurrent.max(1))),
            limits,
            base_input: Arc::new(DetachedInput),
            base_output: Arc::new(TracingSink),
        }
    }

    /// Input source consulted once a session's answers run out, and the sink
    /// captured output is forwarded to.
    pub fn with_console_base(
        mut self,
        input: Arc<dyn InputSource>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        self.base_input = input;
        self.base_output = output;
        self
    }

    pub fn automation_name(&self) -> &'static str {
        self.automation.name()
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn limits(&self) -> RunnerLimits {
        self.limits
    }

    pub fn spawn(self: &Arc<Self>, handle: SessionHandle) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move { runner.run(handle).await })
    }

    /// Worker body. Never returns an error; the outcome goes to the session.
    pub async fn run(&self, handle: SessionHandle) {
        let SessionHandle { session_id, request, channels } = handle;
        let WorkerChannels { status, result, cancel } = channels;

        publish(&status, STARTING_MESSAGE);
        info!(
            event_name = "lookup.worker.started",
            session_id = %session_id,
            automation = self.automation.name(),
            "lookup worker started"
        );

        let outcome = self.execute(&session_id, &request, &status, &cancel).await;

        info!(
            event_name = "lookup.worker.finished",
            session_id = %session_id,
            failed = outcome.is_failure(),
            "lookup worker finished"
        );
        if result.send(outcome).is_err() {
            warn!(
                event_name = "lookup.worker.orphaned",
                session_id = %session_id,
                "session was removed before its result was delivered"
            );
        }
    }

    async fn execute(
        &self,
        session_id: &SessionId,
        request: &LookupRequest,
        status: &StatusSender,
        cancel: &CancellationToken,
    ) -> LookupOutcome {
        let _permit = match self.acquire_permit(status, cancel).await {
            Some(permit) => permit,
            None => return LookupOutcome::failed(LOOKUP_CANCELLED, None),
        };

        let console =
            Arc::new(Console::new(Arc::clone(&self.base_input), Arc::clone(&self.base_output)));
        let (end, log) = {
            let _input = console.substitute_input(request.scripted_answers(), Some(status.clone()));
            let capture = console.capture_output(status.clone());

            // own task so a panicking automation surfaces as a JoinError
            let automation = Arc::clone(&self.automation);
            let run_console = Arc::clone(&console);
            let mut task = tokio::spawn(async move { automation.run(&run_console).await });

            let end = tokio::select! {
                biased;
                _ = cancel.cancelled() => RunEnd::Cancelled,
                finished = tokio::time::timeout(self.limits.timeout, &mut task) => {
                    match finished {
                        Ok(Ok(Ok(()))) => RunEnd::Finished,
                        Ok(Ok(Err(error))) => RunEnd::Failed(format!("{error:#}")),
                        Ok(Err(join_error)) => RunEnd::Failed(join_failure(join_error)),
                        Err(_) => RunEnd::TimedOut,
                    }
                }
            };
            task.abort();
            (end, capture.finish())
        };

        match end {
            RunEnd::Finished => conclude(request, &log, status),
            RunEnd::Failed(error) => {
                let message = format!("Agent error: {error}");
                warn!(
                    event_name = "lookup.worker.automation_failed",
                    session_id = %session_id,
                    error = %message,
                    "automation failed"
                );
                publish(status, &message);
                LookupOutcome::failed(message, None)
            }
            RunEnd::TimedOut => {
                let message =
                    format!("Agent timed out after {} seconds", self.limits.timeout.as_secs());
                warn!(
                    event_name = "lookup.worker.timed_out",
                    session_id = %session_id,
                    "automation timed out"
                );
                publish(status, &message);
                LookupOutcome::failed(message, Some(debug_excerpt(&log.joined())))
            }
            RunEnd::Cancelled => {
                info!(
                    event_name = "lookup.worker.cancelled",
                    session_id = %session_id,
                    "automation cancelled"
                );
                publish(status, LOOKUP_CANCELLED);
                LookupOutcome::failed(LOOKUP_CANCELLED, None)
            }
        }
    }

    async fn acquire_permit(
        &self,
        status: &StatusSender,
        cancel: &CancellationToken,
    ) -> Option<OwnedSemaphorePermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => return Some(permit),
            Err(TryAcquireError::Closed) => return None,
            Err(TryAcquireError::NoPermits) => publish(status, WAITING_FOR_WORKER),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        }
    }
}

fn conclude(request: &LookupRequest, log: &CaptureLog, status: &StatusSender) -> LookupOutcome {
    let full_output = log.joined();

    publish(status, "Checking for CRM reference in agent output...");
    publish(status, &format!("Output preview: {}...", preview(&full_output)));

    match extract_reference(&full_output) {
        Some(found) => {
            publish(status, &format!("Fallback extraction found: {}", found.token));
            publish(status, &format!("Successfully extracted CRM Reference: {}", found.token));
            LookupOutcome::found(request.customer_id.clone(), found.token)
        }
        None => {
            publish(status, "Could not extract CRM reference from agent output");
            publish(status, &format!("Full captured output: {full_output}"));
            LookupOutcome::failed(REFERENCE_NOT_FOUND, Some(debug_excerpt(&full_output)))
        }
    }
}

fn join_failure(error: JoinError) -> String {
    if !error.is_panic() {
        return "automation task was aborted".to_string();
    }
    let payload = error.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("automation panicked: {detail}")
}

fn publish(status: &StatusSender, message: &str) {
    // the poller may already have dropped the session
    let _ = status.send(message.to_string());
}
