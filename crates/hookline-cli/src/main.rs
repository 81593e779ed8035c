#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

use std::fs::File;
use std::path::PathBuf;

use miette::IntoDiagnostic;

use hookline_cli::{CliAction, CliOpts};

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = CliOpts::parse_from_cmdline();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("HOOKLINE_LOG")
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let res = match cli.action {
        CliAction::Run {
            config,
            output,
            program,
            args,
        } => hookline_cli::evaluate_run(config, output, program, args).map(Some),
        CliAction::Symbols { output, binary } => evaluate_symbols(binary, output).map(|_| None),
    };

    match res {
        Ok(Some(exit_code)) => std::process::exit(exit_code),
        Ok(None) => (),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}

fn evaluate_symbols(binary: PathBuf, output: Option<PathBuf>) -> miette::Result<()> {
    if let Some(output) = output {
        let file = File::create(output).into_diagnostic()?;
        hookline_cli::evaluate_symbols(&binary, file)
    } else {
        hookline_cli::evaluate_symbols(&binary, std::io::stdout())
    }
}
