use std::sync::Arc;

use loandesk_automation::{CustomerLookupAgent, HttpCrmPortal, RetryPolicy};
use loandesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use loandesk_core::extraction::{debug_excerpt, extract_reference};
use loandesk_core::runner::LookupAutomation;
use loandesk_core::Console;
use tokio::sync::mpsc;

use crate::commands::CommandResult;

const COMMAND: &str = "lookup";

pub fn run(portal_url: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { crm_portal_url: portal_url, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        }
    };

    let portal = Arc::new(HttpCrmPortal::from_config(&config.crm));
    let agent = CustomerLookupAgent::new(portal, RetryPolicy::from(&config.crm));
    let console = Console::stdio();
    runtime.block_on(run_with(&agent, &console))
}

/// Runs `automation` against `console` and scans what it printed for a CRM
/// reference, the same way a server-side lookup worker does.
pub async fn run_with(automation: &dyn LookupAutomation, console: &Console) -> CommandResult {
    let (status, _status_rx) = mpsc::unbounded_channel();
    let capture = console.capture_output(status);
    let outcome = automation.run(console).await;
    let log = capture.finish();

    if let Err(error) = outcome {
        let message = format!("Agent error: {error:#}");
        return CommandResult::failure(COMMAND, "lookup_failed", message, 4);
    }

    match extract_reference(&log.joined()) {
        Some(found) => CommandResult::success(COMMAND, format!("crm_ref={}", found.token)),
        None => CommandResult::failure(
            COMMAND,
            "reference_not_found",
            format!(
                "Could not find CRM reference number in agent output: {}",
                debug_excerpt(&log.joined())
            ),
            5,
        ),
    }
}
