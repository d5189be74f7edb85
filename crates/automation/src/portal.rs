use std::time::Duration;

use async_trait::async_trait;
use loandesk_core::config::CrmPortalConfig;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortalError {
    #[error("invalid CRM credentials")]
    InvalidCredentials,
    #[error("CRM session is not authorized")]
    Unauthorized,
    #[error("CRM portal returned HTTP {0}")]
    UnexpectedStatus(u16),
    #[error("CRM portal request failed: {0}")]
    Transport(String),
    #[error("CRM portal response could not be decoded: {0}")]
    Decode(String),
}

impl PortalError {
    /// Credential problems will not fix themselves on retry.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::Unauthorized)
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::UnexpectedStatus(status) if *status >= 500)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::UnexpectedStatus(429))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrmCustomer {
    pub id: u64,
    pub name: String,
    pub account_number: String,
    pub crm_ref: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CrmCustomer {
    /// Operators may search by portal id, account number or CRM reference.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        !query.is_empty()
            && (self.id.to_string() == query
                || self.account_number.eq_ignore_ascii_case(query)
                || self.crm_ref.eq_ignore_ascii_case(query))
    }
}

#[async_trait]
pub trait CrmPortal: Send + Sync {
    async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Box<dyn CrmSession>, PortalError>;
}

/// Signed-in portal session. Each login gets its own, so concurrent lookups
/// never share cookies.
#[async_trait]
pub trait CrmSession: Send + Sync {
    async fn customers(&self) -> Result<Vec<CrmCustomer>, PortalError>;
}

#[derive(Clone, Debug)]
pub struct HttpCrmPortal {
    base_url: String,
    request_timeout: Duration,
}

impl HttpCrmPortal {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), request_timeout }
    }

    pub fn from_config(config: &CrmPortalConfig) -> Self {
        Self::new(config.portal_url.clone(), Duration::from_secs(config.request_timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<Client, PortalError> {
        Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .timeout(self.request_timeout)
            .build()
            .map_err(|error| PortalError::Transport(error.to_string()))
    }
}

#[async_trait]
impl CrmPortal for HttpCrmPortal {
    async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Box<dyn CrmSession>, PortalError> {
        let client = self.client()?;
        let response = client
            .post(format!("{}/login", self.base_url))
            .form(&[("username", username), ("password", password.expose_secret())])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        debug!(
            event_name = "automation.portal.login_response",
            status = status.as_u16(),
            location = %location,
            "portal login responded"
        );

        classify_login(status, &location)?;
        Ok(Box::new(HttpCrmSession { client, base_url: self.base_url.clone() }))
    }
}

fn classify_login(status: StatusCode, location: &str) -> Result<(), PortalError> {
    if status.is_redirection() {
        // the portal bounces failed logins back to its sign-in page
        return if location.contains("dashboard") {
            Ok(())
        } else {
            Err(PortalError::InvalidCredentials)
        };
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortalError::InvalidCredentials),
        status if status.is_success() => Ok(()),
        status => Err(PortalError::UnexpectedStatus(status.as_u16())),
    }
}

struct HttpCrmSession {
    client: Client,
    base_url: String,
}

#[async_trait]
impl CrmSession for HttpCrmSession {
    async fn customers(&self) -> Result<Vec<CrmCustomer>, PortalError> {
        let response = self
            .client
            .get(format!("{}/api/customers", self.base_url))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status.is_redirection() {
            return Err(PortalError::Unauthorized);
        }
        if !status.is_success() {
            return Err(PortalError::UnexpectedStatus(status.as_u16()));
        }

        response
            .json::<Vec<CrmCustomer>>()
            .await
            .map_err(|error| PortalError::Decode(error.to_string()))
    }
}

fn transport(error: reqwest::Error) -> PortalError {
    PortalError::Transport(error.to_string())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{classify_login, CrmCustomer, HttpCrmPortal, PortalError};

    fn customer() -> CrmCustomer {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Rajesh Kumar Sharma",
            "email": "rajesh.sharma@email.com",
            "account_number": "GTB001",
            "balance": 1575000.50,
            "status": "Active",
            "crm_ref": "GTBCRM230115001"
        }))
        .expect("portal customer payload")
    }

    #[test]
    fn customers_match_by_id_account_or_reference() {
        let customer = customer();
        assert!(customer.matches("1"));
        assert!(customer.matches(" gtb001 "));
        assert!(customer.matches("gtbcrm230115001"));
        assert!(!customer.matches("2"));
        assert!(!customer.matches(""));
    }

    #[test]
    fn login_redirect_target_decides_outcome() {
        assert_eq!(classify_login(StatusCode::FOUND, "/dashboard"), Ok(()));
        assert_eq!(
            classify_login(StatusCode::FOUND, "/"),
            Err(PortalError::InvalidCredentials)
        );
        assert_eq!(
            classify_login(StatusCode::UNAUTHORIZED, ""),
            Err(PortalError::InvalidCredentials)
        );
        assert_eq!(
            classify_login(StatusCode::SERVICE_UNAVAILABLE, ""),
            Err(PortalError::UnexpectedStatus(503))
        );
    }

    #[test]
    fn error_classes_drive_retry_decisions() {
        assert!(PortalError::Unauthorized.is_auth_failure());
        assert!(PortalError::UnexpectedStatus(502).is_server_error());
        assert!(PortalError::UnexpectedStatus(429).is_rate_limited());
        assert!(!PortalError::Transport("reset".into()).is_auth_failure());
    }

    #[test]
    fn base_url_is_normalized() {
        let portal =
            HttpCrmPortal::new("http://127.0.0.1:5000/", std::time::Duration::from_secs(5));
        assert_eq!(portal.base_url(), "http://127.0.0.1:5000");
    }
}
