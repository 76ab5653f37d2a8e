use assert_cmd::Command;
use serial_test::serial;

fn rmaps(layout: Option<&str>) -> Command {
    let mut cmd = Command::cargo_bin("rmaps-explicit").unwrap();
    cmd.env("RMAPS_EXPLICIT_TOPOLOGY", "package:2 core:2")
        .env_remove("RMAPS_EXPLICIT_CPUS_PER_RANK")
        .env_remove("RMAPS_EXPLICIT_SHOW_HELP")
        .env_remove("RUST_LOG");
    match layout {
        Some(layout) => cmd.env("RMAPS_EXPLICIT_LAYOUT", layout),
        None => cmd.env_remove("RMAPS_EXPLICIT_LAYOUT"),
    };
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{:?}", output);
    String::from_utf8(output.stdout).unwrap()
}

#[test]
#[serial]
fn prints_the_map() {
    let out = stdout(&mut rmaps(Some("MPI[core][0,-,2,1]")));
    println!("{}", out);
    assert!(out.contains("job 1 mapped 3 procs BYCORE"));
    assert!(out.contains("node0 slots 3/4 procs 3"));
    assert!(out.contains("rank 0 -> Core:0 cpus 0"));
    assert!(out.contains("rank 1 -> Core:3 cpus 3"));
    assert!(out.contains("rank 2 -> Core:2 cpus 2"));
}

#[test]
#[serial]
fn oversubscribed_round_robin() {
    let out = stdout(rmaps(Some("MPI[socket][rr]")).args(["10", "2"]));
    assert!(out.contains("mapped 10 procs BYSOCKET (oversubscribed)"));
    assert!(out.contains("node1 slots 4/4 procs 5"));
    assert!(out.contains("-> Package:1 cpus 2-3"));
}

#[test]
#[serial]
fn missing_layout_fails() {
    let output = rmaps(None).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("no layout given"), "{}", stderr);
}

#[test]
#[serial]
fn too_many_procs_fails_quietly() {
    let output = rmaps(Some("MPI[core][0,1]")).arg("3").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("could not place all 3 processes"));
    assert!(!stderr.contains("mapping failed"));
}

#[test]
#[serial]
fn show_help_off_silences_diagnostics() {
    let output = rmaps(Some("MPI[core][0,1]"))
        .env("RMAPS_EXPLICIT_SHOW_HELP", "false")
        .arg("3")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains("could not place"), "{}", stderr);
    assert!(!stderr.contains("RMAPS EXPLICIT"), "{}", stderr);
}

#[test]
#[serial]
fn round_robin_ranks_wider_than_scope() {
    let output = rmaps(Some("MPI[core][rr]"))
        .env("RMAPS_EXPLICIT_CPUS_PER_RANK", "2")
        .arg("2")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("#cpus-per-proc:  2"), "{}", stderr);
    assert!(!stderr.contains("mapping failed"));

    let out = stdout(
        rmaps(Some("MPI[socket][rr]"))
            .env("RMAPS_EXPLICIT_CPUS_PER_RANK", "2")
            .arg("2"),
    );
    assert!(out.contains("rank 0 -> Package:0 cpus 0-1"), "{}", out);
}
