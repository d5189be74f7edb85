use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub lookup: LookupConfig,
    pub crm: CrmPortalConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Limits applied to background lookup workers and their sessions.
#[derive(Clone, Debug)]
pub struct LookupConfig {
    pub max_concurrent: usize,
    pub max_sessions: usize,
    pub timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub reap_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmPortalConfig {
    pub portal_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub crm_portal_url: Option<String>,
    pub lookup_max_concurrent: Option<usize>,
    pub lookup_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                health_check_port: 8081,
                graceful_shutdown_secs: 15,
            },
            lookup: LookupConfig {
                max_concurrent: 4,
                max_sessions: 256,
                timeout_secs: 600,
                session_ttl_secs: 3600,
                reap_interval_secs: 60,
            },
            crm: CrmPortalConfig {
                portal_url: "http://127.0.0.1:5000".to_string(),
                request_timeout_secs: 30,
                max_retries: 5,
                retry_base_delay_ms: 2_000,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("loandesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(lookup) = patch.lookup {
            if let Some(max_concurrent) = lookup.max_concurrent {
                self.lookup.max_concurrent = max_concurrent;
            }
            if let Some(max_sessions) = lookup.max_sessions {
                self.lookup.max_sessions = max_sessions;
            }
            if let Some(timeout_secs) = lookup.timeout_secs {
                self.lookup.timeout_secs = timeout_secs;
            }
            if let Some(session_ttl_secs) = lookup.session_ttl_secs {
                self.lookup.session_ttl_secs = session_ttl_secs;
            }
            if let Some(reap_interval_secs) = lookup.reap_interval_secs {
                self.lookup.reap_interval_secs = reap_interval_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(portal_url) = crm.portal_url {
                self.crm.portal_url = portal_url;
            }
            if let Some(request_timeout_secs) = crm.request_timeout_secs {
                self.crm.request_timeout_secs = request_timeout_secs;
            }
            if let Some(max_retries) = crm.max_retries {
                self.crm.max_retries = max_retries;
            }
            if let Some(retry_base_delay_ms) = crm.retry_base_delay_ms {
                self.crm.retry_base_delay_ms = retry_base_delay_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOANDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LOANDESK_SERVER_PORT") {
            self.server.port = parse_u16("LOANDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("LOANDESK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LOANDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LOANDESK_LOOKUP_MAX_CONCURRENT") {
            self.lookup.max_concurrent = parse_usize("LOANDESK_LOOKUP_MAX_CONCURRENT", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_LOOKUP_MAX_SESSIONS") {
            self.lookup.max_sessions = parse_usize("LOANDESK_LOOKUP_MAX_SESSIONS", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_LOOKUP_TIMEOUT_SECS") {
            self.lookup.timeout_secs = parse_u64("LOANDESK_LOOKUP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_LOOKUP_SESSION_TTL_SECS") {
            self.lookup.session_ttl_secs = parse_u64("LOANDESK_LOOKUP_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_LOOKUP_REAP_INTERVAL_SECS") {
            self.lookup.reap_interval_secs =
                parse_u64("LOANDESK_LOOKUP_REAP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("LOANDESK_CRM_PORTAL_URL") {
            self.crm.portal_url = value;
        }
        if let Some(value) = read_env("LOANDESK_CRM_REQUEST_TIMEOUT_SECS") {
            self.crm.request_timeout_secs =
                parse_u64("LOANDESK_CRM_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_CRM_MAX_RETRIES") {
            self.crm.max_retries = parse_u32("LOANDESK_CRM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("LOANDESK_CRM_RETRY_BASE_DELAY_MS") {
            self.crm.retry_base_delay_ms = parse_u64("LOANDESK_CRM_RETRY_BASE_DELAY_MS", &value)?;
        }

        let log_level =
            read_env("LOANDESK_LOGGING_LEVEL").or_else(|| read_env("LOANDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LOANDESK_LOGGING_FORMAT").or_else(|| read_env("LOANDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(portal_url) = overrides.crm_portal_url {
            self.crm.portal_url = portal_url;
        }
        if let Some(max_concurrent) = overrides.lookup_max_concurrent {
            self.lookup.max_concurrent = max_concurrent;
        }
        if let Some(timeout_secs) = overrides.lookup_timeout_secs {
            self.lookup.timeout_secs = timeout_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_lookup(&self.lookup)?;
        validate_crm(&self.crm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("loandesk.toml"), PathBuf::from("config/loandesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == server.port {
        return Err(ConfigError::Validation(
            "server.health_check_port must differ from server.port".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_lookup(lookup: &LookupConfig) -> Result<(), ConfigError> {
    if lookup.max_concurrent == 0 || lookup.max_concurrent > 64 {
        return Err(ConfigError::Validation(
            "lookup.max_concurrent must be in range 1..=64".to_string(),
        ));
    }

    if lookup.max_sessions < lookup.max_concurrent {
        return Err(ConfigError::Validation(
            "lookup.max_sessions must be at least lookup.max_concurrent".to_string(),
        ));
    }

    if lookup.timeout_secs == 0 || lookup.timeout_secs > 3600 {
        return Err(ConfigError::Validation(
            "lookup.timeout_secs must be in range 1..=3600".to_string(),
        ));
    }

    if lookup.session_ttl_secs < lookup.timeout_secs {
        return Err(ConfigError::Validation(
            "lookup.session_ttl_secs must be at least lookup.timeout_secs so finished sessions stay pollable"
                .to_string(),
        ));
    }

    if lookup.reap_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "lookup.reap_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmPortalConfig) -> Result<(), ConfigError> {
    let url = crm.portal_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "crm.portal_url must start with http:// or https://".to_string(),
        ));
    }

    if crm.request_timeout_secs == 0 || crm.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if crm.max_retries == 0 {
        return Err(ConfigError::Validation(
            "crm.max_retries must be greater than zero (1 means a single attempt)".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    lookup: Option<LookupPatch>,
    crm: Option<CrmPortalPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupPatch {
    max_concurrent: Option<usize>,
    max_sessions: Option<usize>,
    timeout_secs: Option<u64>,
    session_ttl_secs: Option<u64>,
    reap_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPortalPatch {
    portal_url: Option<String>,
    request_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 8080, "default port should be 8080")?;
        ensure(config.lookup.max_concurrent == 4, "default worker pool should be 4")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LOANDESK_PORTAL", "https://crm.example.test");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loandesk.toml");
            fs::write(
                &path,
                r#"
[crm]
portal_url = "${TEST_LOANDESK_PORTAL}"
max_retries = 3
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.crm.portal_url == "https://crm.example.test",
                "portal url should be interpolated from environment",
            )?;
            ensure(config.crm.max_retries == 3, "max retries should come from file")
        })();

        clear_vars(&["TEST_LOANDESK_PORTAL"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_LOANDESK_UNSET_VAR"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("loandesk.toml");
        fs::write(&path, "[crm]\nportal_url = \"${TEST_LOANDESK_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(
                error,
                ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_LOANDESK_UNSET_VAR"
            ),
            "error should name the missing variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOANDESK_LOG_LEVEL", "warn");
        env::set_var("LOANDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["LOANDESK_LOG_LEVEL", "LOANDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOANDESK_CRM_PORTAL_URL", "http://from-env:5000");
        env::set_var("LOANDESK_LOOKUP_MAX_CONCURRENT", "8");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loandesk.toml");
            fs::write(
                &path,
                r#"
[server]
port = 9000

[crm]
portal_url = "http://from-file:5000"

[lookup]
max_concurrent = 2

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    crm_portal_url: Some("http://from-override:5000".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.crm.portal_url == "http://from-override:5000",
                "override portal url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.lookup.max_concurrent == 8, "env pool size should win over file")?;
            ensure(config.server.port == 9000, "file port should win over default")
        })();

        clear_vars(&["LOANDESK_CRM_PORTAL_URL", "LOANDESK_LOOKUP_MAX_CONCURRENT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOANDESK_CRM_PORTAL_URL", "ftp://crm.example.test");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("crm.portal_url")
            );
            ensure(has_message, "validation failure should mention crm.portal_url")
        })();

        clear_vars(&["LOANDESK_CRM_PORTAL_URL"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOANDESK_LOOKUP_TIMEOUT_SECS", "soon");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "LOANDESK_LOOKUP_TIMEOUT_SECS"
                ),
                "error should name the offending env key",
            )
        })();

        clear_vars(&["LOANDESK_LOOKUP_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn session_ttl_shorter_than_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.lookup.timeout_secs = 120;
        config.lookup.session_ttl_secs = 60;

        let error = config.validate().expect_err("ttl shorter than timeout should fail");
        assert!(error.to_string().contains("lookup.session_ttl_secs"));
    }
}
