use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use loandesk_core::{Console, LookupAutomation};
use secrecy::SecretString;
use tracing::info;

use crate::portal::CrmPortal;
use crate::retry::RetryPolicy;

pub const CUSTOMER_ID_PROMPT: &str = "Enter the Customer ID you want to search for: ";
pub const USERNAME_PROMPT: &str = "Enter the Username of the CRM System: ";
pub const PASSWORD_PROMPT: &str = "Enter the Password of the CRM System: ";

const RULE_WIDTH: usize = 50;

/// Finds a customer's CRM reference through the bank's CRM portal.
pub struct CustomerLookupAgent {
    portal: Arc<dyn CrmPortal>,
    retry: RetryPolicy,
}

impl CustomerLookupAgent {
    pub fn new(portal: Arc<dyn CrmPortal>, retry: RetryPolicy) -> Self {
        Self { portal, retry }
    }
}

#[async_trait]
impl LookupAutomation for CustomerLookupAgent {
    fn name(&self) -> &'static str {
        "crm-portal"
    }

    async fn run(&self, console: &Console) -> anyhow::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        console.println(&rule);
        console.println("CUSTOMER LOOKUP SYSTEM");
        console.println(&rule);

        let customer_id = console.prompt(CUSTOMER_ID_PROMPT).await?.trim().to_string();
        let username = console.prompt(USERNAME_PROMPT).await?.trim().to_string();
        let password =
            SecretString::from(console.prompt(PASSWORD_PROMPT).await?.trim().to_string());

        if customer_id.is_empty() {
            console.println("No customer ID provided. Exiting...");
            return Ok(());
        }

        console.println(format!("Searching for Customer ID: {customer_id}"));
        console.println(&rule);

        let portal = self.portal.as_ref();
        let (username, password) = (username.as_str(), &password);
        let session = self
            .retry
            .run(console, move || portal.login(username, password))
            .await
            .context("could not sign in to the CRM portal")?;
        console.println("Signed in to the CRM portal.");

        let session = session.as_ref();
        let customers = self
            .retry
            .run(console, move || session.customers())
            .await
            .context("could not load customers from the CRM portal")?;

        let customer = customers
            .iter()
            .find(|customer| customer.matches(&customer_id))
            .ok_or_else(|| anyhow!("customer {customer_id} was not found in the CRM portal"))?;

        info!(
            event_name = "automation.lookup.customer_found",
            portal_customer_id = customer.id,
            "customer located in CRM portal"
        );
        console.println(format!("Customer found: {} ({})", customer.name, customer.account_number));
        console.println(format!(
            "The CRM Ref for the customer with ID '{customer_id}' is '{}'.",
            customer.crm_ref
        ));
        Ok(())
    }
}
