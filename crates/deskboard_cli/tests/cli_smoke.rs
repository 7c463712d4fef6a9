use std::process::Command;

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_deskboard");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run deskboard --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("task"));
    assert!(stdout.contains("ticket"));
}

#[test]
fn cli_unknown_command_reports_invalid_input() {
    let exe = env!("CARGO_BIN_EXE_deskboard");
    let output = Command::new(exe)
        .arg("nope")
        .output()
        .expect("failed to run deskboard nope");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}
