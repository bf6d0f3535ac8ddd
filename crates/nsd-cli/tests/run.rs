use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn demo(file: &str) -> String {
    format!("{}/../../demos/{}", env!("CARGO_MANIFEST_DIR"), file)
}

#[test]
fn runs_the_production_demo_to_convergence() {
    Command::cargo_bin("nsd")
        .unwrap()
        .args([
            "run",
            &demo("production_tree.yaml"),
            &demo("production_data.yaml"),
            "--iterations",
            "25",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("stop reason:  converged"))
        .stdout(predicate::str::contains("objective:    3.5"));
}

#[test]
fn writes_a_solution_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("solution.yaml");
    Command::cargo_bin("nsd")
        .unwrap()
        .args([
            "run",
            &demo("production_tree.yaml"),
            &demo("production_data.yaml"),
            "--iterations",
            "25",
            "--output",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();
    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains("stop: converged"));
    assert!(text.contains("nodes:"));
    assert!(text.contains("status: optimal"));
}

#[test]
fn rejects_a_tree_with_two_roots() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("tree.yaml");
    fs::write(
        &tree,
        "nodes:\n\
         - id: 1\n\
         \x20 stage: 1\n\
         \x20 template: {file: production, function: stage1}\n\
         - id: 2\n\
         \x20 stage: 1\n\
         \x20 template: {file: production, function: stage1}\n",
    )
    .unwrap();
    Command::cargo_bin("nsd")
        .unwrap()
        .args(["run", tree.to_str().unwrap(), &demo("production_data.yaml")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("root"));
}

#[test]
fn rejects_an_unknown_template_before_solving() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("tree.yaml");
    fs::write(
        &tree,
        "nodes:\n\
         - id: 1\n\
         \x20 stage: 1\n\
         \x20 template: {file: production, function: stage9}\n",
    )
    .unwrap();
    Command::cargo_bin("nsd")
        .unwrap()
        .args(["run", tree.to_str().unwrap(), &demo("production_data.yaml")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not registered"));
}

#[test]
fn rejects_an_unknown_solver() {
    Command::cargo_bin("nsd")
        .unwrap()
        .args([
            "run",
            &demo("production_tree.yaml"),
            &demo("production_data.yaml"),
            "--solver",
            "gurobi",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown solver"));
}

#[test]
fn missing_data_file_fails_with_context() {
    Command::cargo_bin("nsd")
        .unwrap()
        .args([
            "run",
            &demo("production_tree.yaml"),
            "/no/such/data.yaml",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("data.yaml"));
}

#[test]
fn binary_demo_selects_the_covering_resource() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("solution.yaml");
    Command::cargo_bin("nsd")
        .unwrap()
        .args([
            "run",
            &demo("resources_tree.yaml"),
            &demo("resources_data.yaml"),
            "--problem-type",
            "binary",
            "--iterations",
            "30",
            "--output",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();
    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains("nodes:"));
}
