use std::sync::Arc;

use axum::Router;
use loandesk_automation::{CustomerLookupAgent, HttpCrmPortal, RetryPolicy};
use loandesk_core::config::{AppConfig, ConfigError};
use loandesk_core::runner::{LookupAutomation, LookupRunner, RunnerLimits};
use loandesk_core::session::SessionStore;
use loandesk_core::templates::{TemplateCatalog, TemplateError};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::{health, lookup, templates};

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<SessionStore>,
    pub runner: Arc<LookupRunner>,
    pub templates: Arc<TemplateCatalog>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("email templates failed to load: {0}")]
    Templates(#[from] TemplateError),
}

/// Loads configuration and wires the application in one step.
#[cfg(test)]
pub fn bootstrap(
    options: loandesk_core::config::LoadOptions,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let portal = Arc::new(HttpCrmPortal::from_config(&config.crm));
    let agent = CustomerLookupAgent::new(portal, RetryPolicy::from(&config.crm));
    bootstrap_with_automation(config, Arc::new(agent))
}

/// Wires the application around an arbitrary automation.
pub fn bootstrap_with_automation(
    config: AppConfig,
    automation: Arc<dyn LookupAutomation>,
) -> Result<Application, BootstrapError> {
    let store = Arc::new(SessionStore::with_limit(config.lookup.max_sessions));
    let runner = Arc::new(LookupRunner::new(automation, RunnerLimits::from(&config.lookup)));
    let templates = Arc::new(TemplateCatalog::new()?);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        automation = runner.automation_name(),
        max_concurrent = config.lookup.max_concurrent,
        max_sessions = config.lookup.max_sessions,
        portal_url = %config.crm.portal_url,
        "application components initialized"
    );

    Ok(Application { config, store, runner, templates })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(lookup::router(Arc::clone(&self.store), Arc::clone(&self.runner)))
            .merge(templates::router(Arc::clone(&self.templates)))
            .merge(health::router(Arc::clone(&self.store), Arc::clone(&self.runner)))
            .layer(CorsLayer::permissive())
    }
}

#[cfg(test)]
mod tests {
    use loandesk_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[test]
    fn bootstrap_fails_fast_on_invalid_portal_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                crm_portal_url: Some("ftp://crm.internal".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("crm.portal_url"), "{message}");
    }

    #[test]
    fn bootstrap_applies_lookup_limits() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                lookup_max_concurrent: Some(2),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with defaults");

        assert_eq!(app.runner.available_workers(), 2);
        assert_eq!(app.store.limit(), app.config.lookup.max_sessions);
        assert_eq!(app.runner.automation_name(), "crm-portal");
    }
}
