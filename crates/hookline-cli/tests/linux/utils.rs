use std::path::Path;
use std::process::Command;

use kdl::{KdlDocument, KdlNode, KdlValue};

/// Compiles the `hello.c` tracee of the debugger tests, with debug
/// information.
pub fn compile_tracee() -> tempfile::TempPath {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../hookline-debugger/tests/linux");
    let out_file = tempfile::NamedTempFile::new().expect("tempfile");

    let mut gcc = Command::new("gcc");
    gcc.current_dir(&src_dir)
        .args(["-g", "-O0", "-no-pie", "hello.c", "-o"])
        .arg(out_file.path());

    println!("running: {gcc:?}");

    let gcc = gcc.output().expect("gcc");

    if !gcc.status.success() {
        let msg = String::from_utf8_lossy(&gcc.stderr);
        panic!("{msg}");
    }

    out_file.into_temp_path()
}

pub fn read_report(path: &Path) -> KdlDocument {
    let content = std::fs::read_to_string(path).expect("read report");
    content.parse().expect("KDL report")
}

pub fn arg(node: &KdlNode) -> &KdlValue {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .expect("node argument")
        .value()
}

pub fn prop<'a>(node: &'a KdlNode, key: &str) -> &'a KdlValue {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .expect("node property")
        .value()
}
