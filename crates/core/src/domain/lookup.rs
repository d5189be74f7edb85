use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// A customer lookup submitted by an operator: which customer, and the CRM
/// credentials the automation should sign in with.
#[derive(Clone)]
pub struct LookupRequest {
    pub customer_id: String,
    pub username: String,
    password: SecretString,
}

impl LookupRequest {
    pub fn new(
        customer_id: impl AsRef<str>,
        username: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<Self, DomainError> {
        let customer_id = required("customer_id", customer_id.as_ref())?;
        let username = required("username", username.as_ref())?;
        let password = required("password", password.as_ref())?;

        Ok(Self { customer_id, username, password: SecretString::from(password) })
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Answers for the automation's prompts, in the order it asks for them.
    pub fn scripted_answers(&self) -> Vec<SecretString> {
        vec![
            SecretString::from(self.customer_id.clone()),
            SecretString::from(self.username.clone()),
            SecretString::from(self.password.expose_secret().to_string()),
        ]
    }
}

impl fmt::Debug for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupRequest")
            .field("customer_id", &self.customer_id)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

fn required(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// Terminal record a lookup worker places on its result channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupOutcome {
    Found {
        customer_id: String,
        crm_ref: String,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debug_output: Option<String>,
    },
}

impl LookupOutcome {
    pub fn found(customer_id: impl Into<String>, crm_ref: impl Into<String>) -> Self {
        Self::Found { customer_id: customer_id.into(), crm_ref: crm_ref.into() }
    }

    pub fn failed(error: impl Into<String>, debug_output: Option<String>) -> Self {
        Self::Failed { error: error.into(), debug_output }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;
    use serde_json::json;

    use crate::errors::DomainError;

    use super::{LookupOutcome, LookupRequest};

    #[test]
    fn request_fields_are_trimmed_and_required() {
        let request = LookupRequest::new(" C100 ", "user1\n", " pass1").expect("valid");
        assert_eq!(request.customer_id, "C100");
        assert_eq!(request.username, "user1");
        assert_eq!(request.password().expose_secret(), "pass1");

        let error = LookupRequest::new("C100", "   ", "pass1").expect_err("blank username");
        assert_eq!(error, DomainError::MissingField("username"));
    }

    #[test]
    fn scripted_answers_follow_prompt_order() {
        let request = LookupRequest::new("C100", "user1", "pass1").expect("valid");
        let answers: Vec<String> = request
            .scripted_answers()
            .iter()
            .map(|answer| answer.expose_secret().to_string())
            .collect();
        assert_eq!(answers, vec!["C100", "user1", "pass1"]);
    }

    #[test]
    fn debug_output_redacts_password() {
        let request = LookupRequest::new("C100", "user1", "hunter2").expect("valid");
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("C100"));
    }

    #[test]
    fn outcomes_serialize_to_flat_records() {
        let found = serde_json::to_value(LookupOutcome::found("1", "GTBCRM230115001"))
            .expect("serialize");
        assert_eq!(found, json!({"customer_id": "1", "crm_ref": "GTBCRM230115001"}));

        let failed = serde_json::to_value(LookupOutcome::failed("Agent error: boom", None))
            .expect("serialize");
        assert_eq!(failed, json!({"error": "Agent error: boom"}));
    }
}
