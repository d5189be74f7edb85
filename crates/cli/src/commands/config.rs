use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use loandesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            &field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

struct Field {
    key: &'static str,
    env_keys: Vec<&'static str>,
    value: String,
}

fn field(key: &'static str, env_keys: &[&'static str], value: impl ToString) -> Field {
    Field { key, env_keys: env_keys.to_vec(), value: value.to_string() }
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field(
            "server.bind_address",
            &["LOANDESK_SERVER_BIND_ADDRESS"],
            &config.server.bind_address,
        ),
        field("server.port", &["LOANDESK_SERVER_PORT"], config.server.port),
        field(
            "server.health_check_port",
            &["LOANDESK_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port,
        ),
        field(
            "server.graceful_shutdown_secs",
            &["LOANDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs,
        ),
        field(
            "lookup.max_concurrent",
            &["LOANDESK_LOOKUP_MAX_CONCURRENT"],
            config.lookup.max_concurrent,
        ),
        field("lookup.max_sessions", &["LOANDESK_LOOKUP_MAX_SESSIONS"], config.lookup.max_sessions),
        field("lookup.timeout_secs", &["LOANDESK_LOOKUP_TIMEOUT_SECS"], config.lookup.timeout_secs),
        field(
            "lookup.session_ttl_secs",
            &["LOANDESK_LOOKUP_SESSION_TTL_SECS"],
            config.lookup.session_ttl_secs,
        ),
        field(
            "lookup.reap_interval_secs",
            &["LOANDESK_LOOKUP_REAP_INTERVAL_SECS"],
            config.lookup.reap_interval_secs,
        ),
        field("crm.portal_url", &["LOANDESK_CRM_PORTAL_URL"], &config.crm.portal_url),
        field(
            "crm.request_timeout_secs",
            &["LOANDESK_CRM_REQUEST_TIMEOUT_SECS"],
            config.crm.request_timeout_secs,
        ),
        field("crm.max_retries", &["LOANDESK_CRM_MAX_RETRIES"], config.crm.max_retries),
        field(
            "crm.retry_base_delay_ms",
            &["LOANDESK_CRM_RETRY_BASE_DELAY_MS"],
            config.crm.retry_base_delay_ms,
        ),
        field(
            "logging.level",
            &["LOANDESK_LOGGING_LEVEL", "LOANDESK_LOG_LEVEL"],
            &config.logging.level,
        ),
        field(
            "logging.format",
            &["LOANDESK_LOGGING_FORMAT", "LOANDESK_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["loandesk.toml", "config/loandesk.toml"].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
