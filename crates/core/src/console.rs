//! Per-run console capability handed to lookup automations.
//!
//! Automations never touch the process stdin/stdout directly. They prompt and
//! print through a [`Console`], whose input source and output sink can be
//! substituted for the duration of a scope:
//!
//! - [`Console::substitute_input`] answers prompts from a pre-supplied list and
//!   falls back to the previously installed source once the list runs out.
//! - [`Console::capture_output`] tees every printed line to the previous sink,
//!   a status channel, and an in-memory log.
//!
//! Both return guards that reinstall the previous source/sink when dropped, so
//! early returns, `?`, panics and cancelled futures all restore the console.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub type StatusSender = UnboundedSender<String>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("no interactive input is available for prompt `{prompt}`")]
    InputUnavailable { prompt: String },
    #[error("input stream closed before prompt `{prompt}` was answered")]
    InputClosed { prompt: String },
    #[error("console i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait InputSource: Send + Sync {
    async fn read_line(&self, prompt: &str) -> Result<String, ConsoleError>;
}

pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str);
}

pub struct Console {
    input: RwLock<Arc<dyn InputSource>>,
    output: RwLock<Arc<dyn OutputSink>>,
}

impl Console {
    pub fn new(input: Arc<dyn InputSource>, output: Arc<dyn OutputSink>) -> Self {
        Self { input: RwLock::new(input), output: RwLock::new(output) }
    }

    /// Terminal-backed console used by the CLI.
    pub fn stdio() -> Self {
        Self::new(Arc::new(StdinInput), Arc::new(StdoutSink))
    }

    pub async fn prompt(&self, prompt: &str) -> Result<String, ConsoleError> {
        let source = self.current_input();
        source.read_line(prompt).await
    }

    pub fn println(&self, line: impl AsRef<str>) {
        self.current_output().write_line(line.as_ref());
    }

    pub fn substitute_input(
        &self,
        answers: Vec<SecretString>,
        status: Option<StatusSender>,
    ) -> InputGuard<'_> {
        let previous = self.current_input();
        let scripted: Arc<dyn InputSource> =
            Arc::new(ScriptedInput::new(answers, Arc::clone(&previous), status));
        *self.input.write().unwrap_or_else(PoisonError::into_inner) = scripted;
        InputGuard { console: self, previous: Some(previous) }
    }

    pub fn capture_output(&self, status: StatusSender) -> CaptureGuard<'_> {
        let previous = self.current_output();
        let log = Arc::new(Mutex::new(Vec::new()));
        let capture: Arc<dyn OutputSink> = Arc::new(CaptureSink {
            inner: Arc::clone(&previous),
            status,
            log: Arc::clone(&log),
        });
        *self.output.write().unwrap_or_else(PoisonError::into_inner) = capture;
        CaptureGuard { console: self, previous: Some(previous), log }
    }

    fn current_input(&self) -> Arc<dyn InputSource> {
        Arc::clone(&self.input.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn current_output(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.output.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Reinstalls the input source that was active before substitution.
#[must_use = "dropping the guard immediately restores the previous input source"]
pub struct InputGuard<'a> {
    console: &'a Console,
    previous: Option<Arc<dyn InputSource>>,
}

impl Drop for InputGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.console.input.write().unwrap_or_else(PoisonError::into_inner) = previous;
        }
    }
}

/// Reinstalls the output sink that was active before capture.
#[must_use = "dropping the guard immediately restores the previous output sink"]
pub struct CaptureGuard<'a> {
    console: &'a Console,
    previous: Option<Arc<dyn OutputSink>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl CaptureGuard<'_> {
    /// Restores the previous sink and hands back everything captured so far.
    pub fn finish(self) -> CaptureLog {
        let lines = std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner));
        CaptureLog { lines }
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.console.output.write().unwrap_or_else(PoisonError::into_inner) = previous;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureLog {
    pub lines: Vec<String>,
}

impl CaptureLog {
    pub fn joined(&self) -> String {
        self.lines.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

struct ScriptedInput {
    answers: Mutex<VecDeque<SecretString>>,
    fallback: Arc<dyn InputSource>,
    status: Option<StatusSender>,
}

impl ScriptedInput {
    fn new(
        answers: Vec<SecretString>,
        fallback: Arc<dyn InputSource>,
        status: Option<StatusSender>,
    ) -> Self {
        Self { answers: Mutex::new(answers.into()), fallback, status }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn read_line(&self, prompt: &str) -> Result<String, ConsoleError> {
        let next = self.answers.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match next {
            Some(answer) => {
                if let Some(status) = &self.status {
                    // answers carry credentials; only the prompt is published
                    let _ = status.send(format!("Input: {} -> [provided]", prompt.trim()));
                }
                Ok(answer.expose_secret().to_string())
            }
            None => self.fallback.read_line(prompt).await,
        }
    }
}

struct CaptureSink {
    inner: Arc<dyn OutputSink>,
    status: StatusSender,
    log: Arc<Mutex<Vec<String>>>,
}

impl OutputSink for CaptureSink {
    fn write_line(&self, line: &str) {
        self.inner.write_line(line);

        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        for fragment in line.lines().map(str::trim).filter(|fragment| !fragment.is_empty()) {
            let _ = self.status.send(fragment.to_string());
            log.push(fragment.to_string());
        }
    }
}

/// Reads answers from the process stdin.
pub struct StdinInput;

#[async_trait]
impl InputSource for StdinInput {
    async fn read_line(&self, prompt: &str) -> Result<String, ConsoleError> {
        let prompt = prompt.to_string();
        let line = tokio::task::spawn_blocking(move || -> Result<String, ConsoleError> {
            let mut stdout = std::io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;

            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line)?;
            if read == 0 {
                return Err(ConsoleError::InputClosed { prompt });
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .map_err(|error| ConsoleError::Io(std::io::Error::other(error)))??;

        Ok(line)
    }
}

/// Input source for processes without a terminal; every prompt fails.
pub struct DetachedInput;

#[async_trait]
impl InputSource for DetachedInput {
    async fn read_line(&self, prompt: &str) -> Result<String, ConsoleError> {
        Err(ConsoleError::InputUnavailable { prompt: prompt.trim().to_string() })
    }
}

pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Output sink for the server process: automation output becomes log events.
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::debug!(event_name = "lookup.automation.output", line, "automation output");
    }
}

#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl OutputSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(line.to_string());
    }
}
