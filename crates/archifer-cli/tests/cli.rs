//! Integration tests for the `archifer` binary

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const STOCK_CSV: &str = "\
Typ,Nutzung,Nettogrundfläche in Quadratmetern
EFH,Wohnen,100
MFH,Wohnen,400
BUE,Buero,500
";

const SINGLE_CSV: &str = "\
Typ,Nettogrundfläche in Quadratmetern
EFH,250
";

const TOTAL_YAML: &str = r#"
targets:
  Af_total: 1000
weights:
  Af_total: 10
constraints:
  - name: Af_total
    type: sum
    column: NGF
    target: Af_total
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_help() {
    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("summary"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("fit"));
}

#[test]
fn test_summary() {
    let dir = tempdir().unwrap();
    let table = write(&dir, "stock.csv", STOCK_CSV);

    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.args(["summary", arg(&table), "--year", "2030"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gebäudesektor 2030: 3 archetypes"))
        .stdout(predicate::str::contains("Building Sector (2030)"))
        .stdout(predicate::str::contains("Wohnen"))
        .stdout(predicate::str::contains("500.0"));
}

#[test]
fn test_compile_writes_lp() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "fit.yaml", TOTAL_YAML);
    let table = write(&dir, "stock.csv", STOCK_CSV);
    let lp = dir.path().join("model.lp");

    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.args([
        "compile",
        arg(&config),
        arg(&table),
        "--key-column",
        "Typ",
        "--lp-out",
        arg(&lp),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains(
        "Model Archetype_Inference: 5 variables (3 integer), 1 constraints, 1 soft",
    ));

    let text = fs::read_to_string(&lp).unwrap();
    assert!(text.contains(" obj: 10 s_Af_total_pos + 10 s_Af_total_neg\n"));
    assert!(text.contains("100 w_EFH + 400 w_MFH + 500 w_BUE"));
}

#[test]
fn test_compile_unknown_constraint_type() {
    let dir = tempdir().unwrap();
    let config = write(
        &dir,
        "fit.yaml",
        "constraints:\n  - name: x\n    type: bogus\n    column: NGF\n",
    );
    let table = write(&dir, "stock.csv", STOCK_CSV);

    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.args(["compile", arg(&config), arg(&table)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown constraint type: bogus"));
}

#[test]
fn test_fit_writes_json() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "fit.yaml", TOTAL_YAML);
    let table = write(&dir, "single.csv", SINGLE_CSV);
    let out = dir.path().join("fit.json");

    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.args([
        "fit",
        arg(&config),
        arg(&table),
        "--key-column",
        "Typ",
        "--out",
        arg(&out),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("ARCHETYPE"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["solver"], "clarabel");
    assert_eq!(json["counts"][0]["key"], "EFH");
    assert_eq!(json["counts"][0]["count"], 4.0);
    assert_eq!(json["slacks"][0]["name"], "Af_total");
}

#[test]
fn test_fit_unknown_solver() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "fit.yaml", TOTAL_YAML);
    let table = write(&dir, "single.csv", SINGLE_CSV);

    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.args(["fit", arg(&config), arg(&table), "--solver", "gurobi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown lp solver"));
}

#[test]
fn test_fit_reports_broken_hard_constraint() {
    let dir = tempdir().unwrap();
    let config = write(
        &dir,
        "fit.yaml",
        "constraints:\n  - name: Af_total\n    type: sum\n    column: NGF\n    target: 1000\n    hard: true\n",
    );
    let table = write(&dir, "single.csv", "NGF\n300\n");
    let out = dir.path().join("fit.json");

    let mut cmd = cargo_bin_cmd!("archifer");
    cmd.args(["fit", arg(&config), arg(&table), "--out", arg(&out)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hard constraints violated after rounding"))
        .stdout(predicate::str::contains("HARD CONSTRAINT"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["counts"][0]["count"], 3.0);
    assert_eq!(json["residuals"][0]["name"], "Af_total");
    assert_eq!(json["residuals"][0]["hard"], true);
    assert_eq!(json["residuals"][0]["residual"], -100.0);
}
