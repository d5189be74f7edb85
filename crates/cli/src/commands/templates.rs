use loandesk_core::templates::{CustomerData, TemplateCatalog};

use crate::commands::CommandResult;

const COMMAND: &str = "templates";

#[derive(Clone, Debug, Default)]
pub struct CustomerArgs {
    pub customer_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

impl From<CustomerArgs> for CustomerData {
    fn from(args: CustomerArgs) -> Self {
        Self {
            customer_id: args.customer_id,
            name: args.name,
            email: args.email,
            mobile: args.mobile,
        }
    }
}

pub fn run(stage: Option<&str>, customer: CustomerArgs) -> CommandResult {
    let catalog = match TemplateCatalog::new() {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure(COMMAND, "template_compilation", error.to_string(), 3)
        }
    };

    let Some(stage) = stage else {
        let listing = catalog
            .summary()
            .into_iter()
            .map(|entry| {
                format!(
                    "{}. {}: {} ({})",
                    entry.ordinal, entry.stage, entry.subject, entry.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        return CommandResult::success(COMMAND, listing);
    };

    let template = catalog.lookup(stage);
    match catalog.render(&template, &customer.into()) {
        Ok(email) => {
            let mut message = String::new();
            if template.is_fallback() {
                message.push_str(&format!("no template for stage `{stage}`; using generic\n"));
            }
            message.push_str(&format!("Subject: {}\n\n{}", email.subject, email.body));
            CommandResult::success(COMMAND, message)
        }
        Err(error) => CommandResult::failure(COMMAND, "render_failed", error.to_string(), 4),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{run, CustomerArgs};

    fn message(output: &str) -> String {
        let payload: Value = serde_json::from_str(output).expect("json");
        payload["message"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn lists_stages_in_order() {
        let result = run(None, CustomerArgs::default());

        assert_eq!(result.exit_code, 0);
        let listing = message(&result.output);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("1. application:"));
        assert!(lines[5].starts_with("6. loan_application_number:"));
    }

    #[test]
    fn renders_requested_stage_for_customer() {
        let result = run(
            Some("approval"),
            CustomerArgs { name: Some("Asha Rao".to_string()), ..CustomerArgs::default() },
        );

        assert_eq!(result.exit_code, 0);
        let rendered = message(&result.output);
        assert!(rendered.starts_with("Subject: "));
        assert!(rendered.contains("Asha Rao"));
        assert!(!rendered.contains("using generic"));
    }

    #[test]
    fn unknown_stage_notes_the_fallback() {
        let result = run(Some("closing"), CustomerArgs::default());

        assert_eq!(result.exit_code, 0);
        assert!(message(&result.output)
            .starts_with("no template for stage `closing`; using generic"));
    }
}
