mod utils;

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use hookline_debugger::{
    Action, Command, Error, Process, RunState, Signal, StdioMode, Termination,
};
use hookline_symbol::LocationError;

use self::utils::{compile_tracee, corrupt_section};

fn launch(program: &std::path::Path) -> Process {
    let command = Command::new(program).stdio(StdioMode::Piped);
    Process::launch(command).unwrap()
}

fn function_address(process: &Process, name: &str) -> u64 {
    process
        .symbols()
        .expect("symbol table")
        .file("hello.c")
        .expect("hello.c compile unit")
        .function(name)
        .expect("function")
        .address()
}

fn stdout_of(process: &mut Process) -> String {
    let mut out = String::new();
    process
        .take_stdio()
        .stdout
        .expect("piped stdout")
        .read_to_string(&mut out)
        .unwrap();
    out
}

#[test_log::test]
fn break_on_main() {
    let tracee = compile_tracee(false);
    let mut process = launch(&tracee);

    assert_eq!(process.state(), RunState::NotRunning);
    assert!(process.find_text_section().is_some());

    let main = function_address(&process, "main");
    let pcs = Rc::new(RefCell::new(Vec::new()));

    let id = process
        .add_breakpoint("hello.c:main", {
            let pcs = pcs.clone();
            move |regs| {
                pcs.borrow_mut().push(regs.instr_addr());
                Action::Continue
            }
        })
        .unwrap();

    assert_eq!(process.run().unwrap(), Termination::Exited(2));
    assert_eq!(*pcs.borrow(), [main]);
    assert_eq!(process.breakpoint(id).unwrap().hit_count(), 1);
    assert_eq!(stdout_of(&mut process), "hello 41\n");
}

#[test_log::test]
fn break_on_line_with_arguments() {
    let tracee = compile_tracee(true);

    let command = Command::new(&*tracee)
        .arg("one")
        .arg("two")
        .stdio(StdioMode::Piped);
    let mut process = Process::launch(command).unwrap();

    let add = function_address(&process, "add");
    let args = Rc::new(RefCell::new(Vec::new()));

    // `add` is declared on line 3
    process
        .add_breakpoint("hello.c:3", {
            let args = args.clone();
            move |regs| {
                assert_eq!(regs.instr_addr(), add);
                args.borrow_mut().push((regs.arg(0), regs.arg(1)));
                Action::Continue
            }
        })
        .unwrap();

    assert_eq!(process.run().unwrap(), Termination::Exited(4));
    assert_eq!(
        *args.borrow(),
        [(Some(3), Some(40)), (Some(3), Some(1))]
    );
    assert_eq!(stdout_of(&mut process), "hello 43\n");
}

#[test_log::test]
fn abort_on_breakpoint() {
    let tracee = compile_tracee(false);
    let mut process = launch(&tracee);

    let id = process
        .add_breakpoint("hello.c:add", |_| Action::Abort)
        .unwrap();

    assert_eq!(
        process.run().unwrap(),
        Termination::Aborted {
            breakpoint: id,
            signal: Signal::SIGKILL
        }
    );
    assert_eq!(process.state(), RunState::Terminated);

    // killed before `printf`
    assert_eq!(stdout_of(&mut process), "");
}

#[test_log::test]
fn swap_bytes_on_live_tracee() {
    let tracee = compile_tracee(false);
    let mut process = launch(&tracee);

    let main = function_address(&process, "main");
    let before = process.read_memory(main, 16).unwrap();

    let old = process.swap_bytes(main + 3, &[0xcc; 5]).unwrap();
    assert_eq!(old, before[3..8]);

    let patched = process.read_memory(main, 16).unwrap();
    assert_eq!(patched[3..8], [0xccu8; 5]);
    assert_eq!(patched[..3], before[..3]);
    assert_eq!(patched[8..], before[8..]);

    process.swap_bytes(main + 3, &old).unwrap();
    assert_eq!(process.read_memory(main, 16).unwrap(), before);

    assert_eq!(process.run().unwrap(), Termination::Exited(2));
}

#[test_log::test]
fn toggled_breakpoint_is_not_hit() {
    let tracee = compile_tracee(false);
    let mut process = launch(&tracee);

    let id = process
        .add_breakpoint("hello.c:main", |_| Action::Abort)
        .unwrap();

    assert!(!process.toggle_breakpoint(id).unwrap());
    assert_eq!(process.run().unwrap(), Termination::Exited(2));
    assert_eq!(process.breakpoint(id).unwrap().hit_count(), 0);
}

#[test_log::test]
fn unresolvable_locations() {
    let tracee = compile_tracee(false);
    let mut process = launch(&tracee);

    assert!(matches!(
        process.add_breakpoint("hello.c:nope", |_| Action::Continue),
        Err(Error::Location(LocationError::SymbolNotFound(_)))
    ));
    assert!(matches!(
        process.add_breakpoint("hello.c:4", |_| Action::Continue),
        Err(Error::Location(LocationError::Unsupported(_)))
    ));
    assert_eq!(process.breakpoints().count(), 0);

    process.kill().unwrap();
}

#[test_log::test]
fn kill_handle_stops_the_tracee() {
    let tracee = compile_tracee(false);
    let mut process = launch(&tracee);

    process.kill_handle().kill().unwrap();

    assert_eq!(
        process.run().unwrap(),
        Termination::Signaled(Signal::SIGKILL)
    );
}

#[test_log::test]
fn missing_program() {
    let err = Process::launch(Command::new("/nonexistent/hookline/tracee")).unwrap_err();
    assert!(matches!(err, Error::Launch(..)));
}

#[test_log::test]
fn broken_debug_info_leaves_raw_addresses() {
    let tracee = compile_tracee(false);

    let main = {
        let mut process = launch(&tracee);
        let main = function_address(&process, "main");
        process.kill().unwrap();
        main
    };

    corrupt_section(&tracee, ".debug_abbrev");

    let mut process = launch(&tracee);
    assert!(process.symbols().is_none());

    assert!(matches!(
        process.add_breakpoint("hello.c:main", |_| Action::Continue),
        Err(Error::Location(LocationError::MissingDebugInfo))
    ));

    let id = process
        .add_breakpoint(&format!("{main:#x}"), move |regs| {
            assert_eq!(regs.instr_addr(), main);
            Action::Continue
        })
        .unwrap();

    assert_eq!(process.run().unwrap(), Termination::Exited(2));
    assert_eq!(process.breakpoint(id).unwrap().hit_count(), 1);
}
