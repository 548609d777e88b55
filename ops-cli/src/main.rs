use clap::Parser;
use colored::Colorize;
use error_common::{ErrorContext, ErrorReporter, ImageVaultError};
use ops_cli::{error_context, load_logger_config, run, Cli, Workspace};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger_config = load_logger_config(&cli.config).verbose(cli.verbose);
    if let Err(e) = logger_redacted::init_logging(&logger_config) {
        eprintln!("{} {}", "warning:".yellow(), e);
    }
    let redactor = logger_redacted::redactor_for(&logger_config);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting imagevault-acl");

    let context = error_context(&cli.command);
    let workspace = if cli.command.needs_config() {
        match Workspace::load(&cli.config, redactor) {
            Ok(workspace) => Some(workspace),
            Err(e) => return report(&e, &context),
        }
    } else {
        None
    };

    match run(&cli.command, workspace.as_ref(), cli.output).await {
        Ok(output) => {
            println!("{}", output.text);
            match output.exit_code {
                0 => ExitCode::SUCCESS,
                code => ExitCode::from(u8::try_from(code).unwrap_or(1)),
            }
        }
        Err(e) => report(&e, &context),
    }
}

fn report(error: &ImageVaultError, context: &ErrorContext) -> ExitCode {
    ErrorReporter::new().report(error, context);
    eprintln!("{} [{}] {}", "error:".red().bold(), error.code(), error);
    if error.is_infrastructure() {
        ExitCode::from(3)
    } else {
        ExitCode::from(2)
    }
}
