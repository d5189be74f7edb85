//! Loan-stage customer email templates.
//!
//! Six stages, each with a subject, a short description and an HTML body
//! rendered by tera. Bodies share `email/base.html` and are autoescaped, so
//! customer-supplied names never inject markup. Unknown stages resolve to a
//! generic update template instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

const BASE_LAYOUT: &str = include_str!("../templates/email/base.html");

const FALLBACK_KEY: &str = "generic";
const FALLBACK_SUBJECT: &str = "Update from Global Trust Bank";
const FALLBACK_DESCRIPTION: &str = "Generic update template for unrecognized stages";
const FALLBACK_BODY: &str = include_str!("../templates/email/generic.html");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStage {
    Application,
    DocumentSubmission,
    Verification,
    DocumentApproval,
    Approval,
    LoanApplicationNumber,
}

impl LoanStage {
    pub const ALL: [LoanStage; 6] = [
        LoanStage::Application,
        LoanStage::DocumentSubmission,
        LoanStage::Verification,
        LoanStage::DocumentApproval,
        LoanStage::Approval,
        LoanStage::LoanApplicationNumber,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::DocumentSubmission => "document_submission",
            Self::Verification => "verification",
            Self::DocumentApproval => "document_approval",
            Self::Approval => "approval",
            Self::LoanApplicationNumber => "loan_application_number",
        }
    }

    /// 1-based position in the loan journey.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Application => 1,
            Self::DocumentSubmission => 2,
            Self::Verification => 3,
            Self::DocumentApproval => 4,
            Self::Approval => 5,
            Self::LoanApplicationNumber => 6,
        }
    }

    /// Accepts `"3"`, `"stage 3"`, `"verification"` and `"verification stage"`,
    /// case-insensitively. Multi-word names may use spaces before ` stage`.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        if let Some(number) = normalized.strip_prefix("stage ") {
            return Self::from_ordinal(number.trim());
        }
        if let Some(words) = normalized.strip_suffix(" stage") {
            return Self::from_key(&words.trim().replace(' ', "_"));
        }

        Self::from_ordinal(&normalized).or_else(|| Self::from_key(&normalized))
    }

    fn from_ordinal(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.ordinal().to_string() == value)
    }

    fn from_key(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.key() == value)
    }

    fn subject(self) -> &'static str {
        match self {
            Self::Application => {
                "Your Home Loan Application Has Been Submitted – Welcome to Global Trust Bank"
            }
            Self::DocumentSubmission => {
                "Next Step: Document Upload Required – Global Trust Bank Home Loan"
            }
            Self::Verification => {
                "Thank You for Submitting Your Documents – Verification in Progress"
            }
            Self::DocumentApproval => "Your Documents Have Been Successfully Verified",
            Self::Approval => "Great News – Your Home Loan is Confirmed!",
            Self::LoanApplicationNumber => {
                "Your Loan Application Has Been Successfully Submitted – Global Trust Bank"
            }
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Application => {
                "Welcome email confirming successful application submission with AI assistant introduction"
            }
            Self::DocumentSubmission => {
                "Document upload instructions with checklist and requirements"
            }
            Self::Verification => {
                "Acknowledgment of document submission with verification status update"
            }
            Self::DocumentApproval => {
                "Confirmation that all documents have been verified and approved"
            }
            Self::Approval => "Final loan approval confirmation with celebration and next steps",
            Self::LoanApplicationNumber => {
                "Confirmation email with loan application number after successful submission"
            }
        }
    }

    fn body(self) -> &'static str {
        match self {
            Self::Application => include_str!("../templates/email/application.html"),
            Self::DocumentSubmission => include_str!("../templates/email/document_submission.html"),
            Self::Verification => include_str!("../templates/email/verification.html"),
            Self::DocumentApproval => include_str!("../templates/email/document_approval.html"),
            Self::Approval => include_str!("../templates/email/approval.html"),
            Self::LoanApplicationNumber => {
                include_str!("../templates/email/loan_application_number.html")
            }
        }
    }
}

impl fmt::Display for LoanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unrendered template. `stage` is `None` for the generic fallback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailTemplate {
    pub key: &'static str,
    pub stage: Option<LoanStage>,
    pub subject: &'static str,
    pub description: &'static str,
    pub body: &'static str,
}

impl EmailTemplate {
    pub fn for_stage(stage: LoanStage) -> Self {
        Self {
            key: stage.key(),
            stage: Some(stage),
            subject: stage.subject(),
            description: stage.description(),
            body: stage.body(),
        }
    }

    pub fn fallback() -> Self {
        Self {
            key: FALLBACK_KEY,
            stage: None,
            subject: FALLBACK_SUBJECT,
            description: FALLBACK_DESCRIPTION,
            body: FALLBACK_BODY,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.stage.is_none()
    }

    fn body_name(&self) -> String {
        format!("email/{}.html", self.key)
    }

    fn subject_name(&self) -> String {
        format!("subject/{}", self.key)
    }
}

/// Customer fields available to templates. Missing fields get placeholders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerData {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

impl CustomerData {
    fn context(&self) -> Context {
        let customer_id = present(&self.customer_id);
        let mut context = Context::new();
        context.insert(
            "customer_name",
            &present(&self.name)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Customer {}", customer_id.unwrap_or("N/A"))),
        );
        context.insert("customer_id", customer_id.unwrap_or("N/A"));
        context.insert("customer_email", present(&self.email).unwrap_or("your-email@example.com"));
        context.insert(
            "customer_mobile",
            present(&self.mobile).unwrap_or("Your registered mobile number"),
        );
        context
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub stage: &'static str,
    pub subject: String,
    pub body: String,
    pub description: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    pub stage: &'static str,
    pub ordinal: u8,
    pub subject: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template engine error: {0}")]
    Engine(#[from] tera::Error),
}

pub struct TemplateCatalog {
    tera: Tera,
}

impl TemplateCatalog {
    pub fn new() -> Result<Self, TemplateError> {
        let mut sources = vec![("email/base.html".to_string(), BASE_LAYOUT.to_string())];
        let templates = LoanStage::ALL
            .into_iter()
            .map(EmailTemplate::for_stage)
            .chain(std::iter::once(EmailTemplate::fallback()));
        for template in templates {
            sources.push((template.body_name(), template.body.to_string()));
            sources.push((template.subject_name(), template.subject.to_string()));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)?;
        Ok(Self { tera })
    }

    /// Resolves free-form stage input, falling back to the generic template.
    pub fn lookup(&self, input: &str) -> EmailTemplate {
        LoanStage::parse(input)
            .map(EmailTemplate::for_stage)
            .unwrap_or_else(EmailTemplate::fallback)
    }

    pub fn render(
        &self,
        template: &EmailTemplate,
        customer: &CustomerData,
    ) -> Result<RenderedEmail, TemplateError> {
        let context = customer.context();
        Ok(RenderedEmail {
            stage: template.key,
            subject: self.tera.render(&template.subject_name(), &context)?,
            body: self.tera.render(&template.body_name(), &context)?,
            description: template.description,
        })
    }

    pub fn summary(&self) -> Vec<TemplateSummary> {
        LoanStage::ALL
            .into_iter()
            .map(|stage| TemplateSummary {
                stage: stage.key(),
                ordinal: stage.ordinal(),
                subject: stage.subject(),
                description: stage.description(),
            })
            .collect()
    }
}
