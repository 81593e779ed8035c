mod utils;

use self::utils::{arg, compile_tracee, prop, read_report};

fn run(config: &str, program: &std::path::Path, args: &[&str]) -> (i32, kdl::KdlDocument) {
    let report = tempfile::NamedTempFile::new().unwrap();

    let exit_code = hookline_cli::evaluate_run(
        config.to_owned(),
        Some(report.path().to_path_buf()),
        program.to_path_buf(),
        args.iter().map(|arg| (*arg).to_owned()).collect(),
    )
    .unwrap();

    (exit_code, read_report(report.path()))
}

#[test_log::test]
fn run_reports_hits_and_exit_code() {
    let tracee = compile_tracee();

    let (exit_code, report) = run(
        indoc::indoc! {r#"
            breakpoint "hello.c:main"
            breakpoint "hello.c:add" {
                registers
            }
        "#},
        &tracee,
        &["one"],
    );

    // add(argc, 1) with argc = 2
    assert_eq!(exit_code, 3);

    let nodes = report.nodes();
    let names = nodes.iter().map(|n| n.name().value()).collect::<Vec<_>>();
    assert_eq!(names, ["hit", "hit", "hit", "exited"]);

    assert_eq!(arg(&nodes[0]).as_string(), Some("hello.c:main"));
    assert_eq!(prop(&nodes[0], "count").as_integer(), Some(1));
    assert!(nodes[0].children().is_none());

    for (node, count) in nodes[1..3].iter().zip([1, 2]) {
        assert_eq!(arg(node).as_string(), Some("hello.c:add"));
        assert_eq!(prop(node, "count").as_integer(), Some(count));
        assert!(!node.children().unwrap().nodes().is_empty());
    }

    // both hits of `add` are at its entry
    assert_eq!(prop(&nodes[1], "addr"), prop(&nodes[2], "addr"));

    assert_eq!(arg(&nodes[3]).as_integer(), Some(3));
}

#[test_log::test]
fn run_aborts_on_breakpoint() {
    let tracee = compile_tracee();

    let (exit_code, report) = run(r#"breakpoint "hello.c:add" action="abort""#, &tracee, &[]);

    assert_eq!(exit_code, 137);

    let nodes = report.nodes();
    let names = nodes.iter().map(|n| n.name().value()).collect::<Vec<_>>();
    assert_eq!(names, ["hit", "aborted"]);
    assert_eq!(prop(&nodes[1], "breakpoint").as_string(), Some("#1"));
}

#[test_log::test]
fn run_rejects_unresolvable_breakpoint() {
    let tracee = compile_tracee();
    let report = tempfile::NamedTempFile::new().unwrap();

    let res = hookline_cli::evaluate_run(
        r#"breakpoint "hello.c:nope""#.to_owned(),
        Some(report.path().to_path_buf()),
        tracee.to_path_buf(),
        Vec::new(),
    );

    assert!(res.is_err());
}

#[test_log::test]
fn symbols_lists_functions() {
    let tracee = compile_tracee();

    let mut out = Vec::new();
    hookline_cli::evaluate_symbols(&tracee, &mut out).unwrap();

    let report = String::from_utf8(out)
        .unwrap()
        .parse::<kdl::KdlDocument>()
        .unwrap();

    let hello = report
        .nodes()
        .iter()
        .find(|n| n.name().value() == "file" && arg(n).as_string() == Some("hello.c"))
        .expect("hello.c file node");

    let functions = hello
        .children()
        .unwrap()
        .nodes()
        .iter()
        .map(|f| arg(f).as_string().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(functions, ["add", "main"]);
}
