use std::cell::RefCell;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hookline_debugger::{Action, Command, KillHandle, Process};
use miette::{IntoDiagnostic, WrapErr};
use tokio::sync::oneshot;

use crate::RunConfig;
use crate::report::{hit_node, termination_node, write_node};

type Output = Box<dyn Write + Send>;

/// Runs the subcommand for running a breakpoint session.
///
/// Returns the exit code of the program.
pub fn evaluate_run(
    config: String,
    output: Option<PathBuf>,
    program: PathBuf,
    args: Vec<String>,
) -> miette::Result<i32> {
    let config = parse_run_config(config)?;

    let output: Output = match output {
        Some(path) => Box::new(File::create(path).into_diagnostic()?),
        None => Box::new(std::io::stdout()),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    runtime.block_on(async move {
        let (handle_tx, handle_rx) = oneshot::channel();

        // ptrace requests must come from the thread which launched the tracee
        let mut session = tokio::task::spawn_blocking(move || {
            trace_session(config, program, args, output, handle_tx)
        });

        let Ok(kill_handle) = handle_rx.await else {
            // launch failed
            return session.await.into_diagnostic()?;
        };

        tokio::select! {
            res = &mut session => res.into_diagnostic()?,
            res = tokio::signal::ctrl_c() => {
                res.into_diagnostic()?;

                tracing::info!("interrupted, killing tracee");
                kill_handle.kill().into_diagnostic()?;

                session.await.into_diagnostic()?
            }
        }
    })
}

fn trace_session(
    config: RunConfig,
    program: PathBuf,
    args: Vec<String>,
    output: Output,
    handle_tx: oneshot::Sender<KillHandle>,
) -> miette::Result<i32> {
    let command = Command::new(program).args(args);

    let mut process = Process::launch(command).into_diagnostic()?;

    let _ = handle_tx.send(process.kill_handle());

    let output = Rc::new(RefCell::new(output));

    for bp_config in config.breakpoints {
        let location = bp_config.location.clone();
        let action = Action::from(bp_config.action);
        let output = output.clone();
        let mut count = 0;

        process
            .add_breakpoint(&bp_config.location, move |regs| {
                count += 1;

                let registers = bp_config.registers.then_some(regs);
                let node = hit_node(&location, regs.instr_addr(), count, registers);

                if let Err(e) = write_node(&mut *output.borrow_mut(), node) {
                    tracing::error!(error = %e, "failed to write hit report");
                }

                action
            })
            .into_diagnostic()
            .wrap_err_with(|| format!("breakpoint {:?}", bp_config.location))?;
    }

    let termination = process.run().into_diagnostic()?;

    write_node(&mut *output.borrow_mut(), termination_node(&termination)).into_diagnostic()?;

    Ok(termination.exit_code())
}

/// Parses the run configuration, either inline or from a `.kdl` file.
pub fn parse_run_config(config: String) -> miette::Result<RunConfig> {
    let path = Path::new(&config);

    let config = if let Some((filename, "kdl")) = path
        .file_name()
        .and_then(OsStr::to_str)
        .zip(path.extension().and_then(OsStr::to_str))
    {
        let content = std::fs::read_to_string(path).into_diagnostic()?;
        knus::parse(filename, &content)?
    } else {
        knus::parse("<content>", &config)?
    };

    Ok(config)
}
