use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Compiles `hello.c` with debug information.
///
/// The compiler runs from the source directory, so that the compile unit is
/// named `hello.c`.
pub fn compile_tracee(is_pie: bool) -> tempfile::TempPath {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/linux");
    let out_file = tempfile::NamedTempFile::new().expect("tempfile");

    let mut gcc = Command::new("gcc");
    gcc.current_dir(&src_dir)
        .args(["-g", "-O0", "hello.c", "-o"])
        .arg(out_file.path());

    if is_pie {
        gcc.arg("-pie");
    } else {
        gcc.arg("-no-pie");
    }

    println!("running: {gcc:?}");

    let gcc = gcc.output().expect("gcc");

    if !gcc.status.success() {
        let msg = String::from_utf8_lossy(&gcc.stderr);
        panic!("{msg}");
    }

    out_file.into_temp_path()
}

/// Overwrites the content of an ELF section with garbage.
pub fn corrupt_section(binary: &Path, section: &str) {
    let mut garbage = tempfile::NamedTempFile::new().expect("tempfile");
    garbage.write_all(&[0xff; 64]).expect("write garbage");

    let mut objcopy = Command::new("objcopy");
    objcopy
        .arg(format!("--update-section={section}={}", garbage.path().display()))
        .arg(binary);

    println!("running: {objcopy:?}");

    let objcopy = objcopy.output().expect("objcopy");

    if !objcopy.status.success() {
        let msg = String::from_utf8_lossy(&objcopy.stderr);
        panic!("{msg}");
    }
}
