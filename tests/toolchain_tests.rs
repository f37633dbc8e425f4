//! Toolchain driver behaviour with stand-in compilers.
//!
//! The stand-ins are small shell scripts written into temporary directories
//! and found through an explicit search path, so these tests never depend on
//! the host's compiler.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kernelgen::toolchain::{find_compiler, Toolchain};
use kernelgen::{
    Arch, ConfigError, DataType, GeneratorConfig, KernelError, KernelGenerator, StreamBinding,
    StreamDecl, Template, ThreadBinding, ToolchainError,
};

/// Helper to write an executable shell script into `dir`
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", path.display(), e));
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Stand-in that prints a diagnostic and writes a non-object to `-o`.
const JUNK_COMPILER: &str = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
echo "fake-cc: warning: pretend diagnostic" >&2
printf 'junk' > "$out""#;

/// Stand-in that always fails.
const FAILING_COMPILER: &str = r#"echo "fake-cc: error: unknown mnemonic" >&2
exit 3"#;

fn spin_template() -> Template {
    Template::builder("spin")
        .body("LOOP(l, eax=0, <, edi=ITERATIONS, 1)\nnop\nLOOPEND(l)")
        .build()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_caller_candidate_is_preferred() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let first = write_script(dir.path(), "first-cc", "exit 0");
    write_script(dir.path(), "gcc", "exit 0");

    let found = find_compiler(&["first-cc".to_string()], Some(&[dir.path().to_path_buf()])).unwrap();
    assert_eq!(found, first);

    let found = find_compiler(&["missing-cc".to_string()], Some(&[dir.path().to_path_buf()])).unwrap();
    assert_eq!(found, dir.path().join("gcc"));
}

#[test]
fn test_no_compiler_lists_candidates() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let err = find_compiler(&[], Some(&[dir.path().to_path_buf()])).unwrap_err();
    match err {
        ToolchainError::CompilerNotFound { candidates } => {
            assert_eq!(candidates, vec!["gcc", "cc", "clang"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_compiler_failure_carries_command_and_output() {
    init_logging();
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_script(bin.path(), "bad-cc", FAILING_COMPILER);

    let template = spin_template();
    let config = GeneratorConfig::new(Arch::X86)
        .with_temp_dir(out.path())
        .with_compiler("bad-cc")
        .with_search_path(vec![bin.path().to_path_buf()]);
    let generator = KernelGenerator::new(&template, config).unwrap();
    let err = generator
        .build_thread(&ThreadBinding::new(0, Vec::new()))
        .unwrap_err();

    match err {
        KernelError::Toolchain(ToolchainError::CompilerFailed {
            command,
            status,
            output,
        }) => {
            assert!(command.contains("bad-cc -fPIC -shared -m32"), "{command}");
            let tail = format!("spin_0.s -o {}", out.path().join("spin_0.so").display());
            assert!(command.ends_with(&tail), "{command}");
            assert!(status.contains('3'), "{status}");
            assert!(output.contains("unknown mnemonic"), "{output}");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The assembly is written before the compiler runs.
    let asm = fs::read_to_string(out.path().join("spin_0.s")).unwrap();
    assert!(asm.contains("spin:"));
    assert!(asm.contains("mov edi, 1"));
}

#[test]
fn test_unloadable_object_is_a_load_error() {
    init_logging();
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let cc = write_script(bin.path(), "junk-cc", JUNK_COMPILER);

    let toolchain = Toolchain::with_compiler(&cc);
    let lines = vec!["nop".to_string()];
    let err = toolchain
        .build(Arch::X86_64.backend(), &lines, "k", 2, out.path())
        .unwrap_err();
    match err {
        ToolchainError::Load { path, .. } => assert_eq!(path, out.path().join("k_2.so")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_to_string(out.path().join("k_2.s")).unwrap(), "nop\n");
}

#[test]
fn test_exhaustion_runs_no_compiler() {
    init_logging();
    let bin = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let marker = bin.path().join("ran");
    write_script(
        bin.path(),
        "gcc",
        &format!("touch {}\nexit 1", marker.display()),
    );

    let mut builder = Template::builder("wide").body("nop");
    for i in 0..11 {
        builder = builder.stream(StreamDecl::new(format!("S{i}"), DataType::Double, &["N"]));
    }
    let template = builder.build();
    let config = GeneratorConfig::new(Arch::Ppc64)
        .with_temp_dir(out.path())
        .with_search_path(vec![bin.path().to_path_buf()]);
    let generator = KernelGenerator::new(&template, config).unwrap();

    let streams = (0..11).map(|i| StreamBinding::new(0x1000 * (i + 1), &[8])).collect();
    let results = generator.build_threads(&[ThreadBinding::new(0, streams)]);
    assert!(matches!(
        results[0],
        Err(KernelError::Config(ConfigError::RegistersExhausted {
            arch: "ppc64",
            streams: 11,
            free: 10
        }))
    ));
    assert!(!marker.exists());
}

#[test]
fn test_each_thread_fails_individually() {
    init_logging();
    let out = tempfile::tempdir().unwrap();
    let template = Template::builder("pair")
        .body("nop")
        .stream(StreamDecl::new("STR0", DataType::Int, &["ROWS", "COLS"]))
        .build();
    let config = GeneratorConfig::new(Arch::ArmV8)
        .with_temp_dir(out.path())
        .with_search_path(Vec::new());
    let generator = KernelGenerator::new(&template, config).unwrap();

    let results = generator.build_threads(&[
        ThreadBinding::new(0, vec![StreamBinding::new(0x1000, &[4])]),
        ThreadBinding::new(1, vec![StreamBinding::new(0x2000, &[4, 4])]),
    ]);
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0],
        Err(KernelError::Config(ConfigError::ExtentMismatch { .. }))
    ));
    assert!(matches!(
        results[1],
        Err(KernelError::Toolchain(ToolchainError::CompilerNotFound { .. }))
    ));
}
