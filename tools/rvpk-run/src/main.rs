use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use rvpk_run::cli::Cli;
use rvpk_run::logger::StderrLogger;
use rvpk_run::output::{self, OutputFormat};
use rvpk_run::run;

fn main() -> ExitCode {
    let cli = Cli::parse();
    StderrLogger::install(cli.level_filter());

    // JSON mode keeps stdout for the summary object, so the guest console is captured
    let result = match cli.output {
        OutputFormat::Human => run::run(&cli, std::io::stdout()),
        OutputFormat::Json => {
            let mut console = Vec::new();
            let result = run::run(&cli, &mut console);
            let captured = String::from_utf8_lossy(&console).into_owned();
            match result {
                Ok(mut summary) => {
                    summary.console = Some(captured);
                    Ok(summary)
                }
                Err(e) => {
                    let _ = std::io::stderr().write_all(captured.as_bytes());
                    Err(e)
                }
            }
        }
    };

    match result {
        Ok(summary) => match output::emit(cli.output, &summary) {
            Ok(()) => ExitCode::from(summary.exit_status()),
            Err(e) => {
                let e = rvpk_run::error::RunError::from(e);
                output::emit_error(cli.output, e.exit_status(), &e.to_string());
                e.exit_code()
            }
        },
        Err(e) => {
            output::emit_error(cli.output, e.exit_status(), &e.to_string());
            e.exit_code()
        }
    }
}
