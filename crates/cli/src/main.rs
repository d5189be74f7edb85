use std::process::ExitCode;

fn main() -> ExitCode {
    loandesk_cli::run()
}
