pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "loandesk",
    about = "Loandesk operator CLI",
    long_about = "Check runtime readiness, inspect configuration, run a customer lookup from the terminal, and preview loan-stage emails.",
    after_help = "Examples:\n  loandesk doctor --json\n  loandesk config\n  loandesk lookup\n  loandesk templates --stage \"stage 2\" --customer-id 1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, email templates, and CRM portal reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the CRM customer lookup interactively in this terminal")]
    Lookup {
        #[arg(long, help = "Override crm.portal_url for this run")]
        portal_url: Option<String>,
    },
    #[command(about = "List loan-stage email templates, or render one for a customer")]
    Templates {
        #[arg(long, help = "Stage to render: 1-6, a stage name, or \"stage N\"")]
        stage: Option<String>,
        #[arg(long)]
        customer_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        mobile: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Lookup { portal_url } => commands::lookup::run(portal_url),
        Command::Templates { stage, customer_id, name, email, mobile } => {
            commands::templates::run(
                stage.as_deref(),
                commands::templates::CustomerArgs { customer_id, name, email, mobile },
            )
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
