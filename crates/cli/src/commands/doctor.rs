use std::time::Duration;

use loandesk_core::config::{AppConfig, LoadOptions};
use loandesk_core::templates::TemplateCatalog;
use serde::Serialize;

const SKIPPED_NO_CONFIG: &str = "skipped because configuration did not load";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_email_templates());
            checks.push(check_portal_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "email_templates",
                status: CheckStatus::Skipped,
                details: SKIPPED_NO_CONFIG.to_string(),
            });
            checks.push(DoctorCheck {
                name: "crm_portal_reachability",
                status: CheckStatus::Skipped,
                details: SKIPPED_NO_CONFIG.to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_email_templates() -> DoctorCheck {
    match TemplateCatalog::new() {
        Ok(catalog) => DoctorCheck {
            name: "email_templates",
            status: CheckStatus::Pass,
            details: format!("{} stage templates compiled", catalog.summary().len()),
        },
        Err(error) => DoctorCheck {
            name: "email_templates",
            status: CheckStatus::Fail,
            details: format!("template compilation failed: {error}"),
        },
    }
}

// Any HTTP response counts as reachable; only transport errors fail.
fn check_portal_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "crm_portal_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let portal_url = config.crm.portal_url.clone();
    let timeout = Duration::from_secs(config.crm.request_timeout_secs);
    let result = runtime.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| format!("failed to build http client: {error}"))?;
        let response = client
            .get(&portal_url)
            .send()
            .await
            .map_err(|error| format!("failed to reach CRM portal: {error}"))?;
        Ok::<u16, String>(response.status().as_u16())
    });

    match result {
        Ok(status) => DoctorCheck {
            name: "crm_portal_reachability",
            status: CheckStatus::Pass,
            details: format!("`{portal_url}` answered with HTTP {status}"),
        },
        Err(details) => {
            DoctorCheck { name: "crm_portal_reachability", status: CheckStatus::Fail, details }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
