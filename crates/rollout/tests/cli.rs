//! Tests running the rollout binary against configurations on disk

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG: &str = r#"
components:
  prereq:
    aws:
      account: "12345"
  image:
    needs: [git, prereq]
    docker:
      image: registry/myapp
      tagsFrom: [git.sha]
  deploy:
    needs: [image]
    kubernetes:
      path: k8s
      kustomize: true
      images:
        - name: myapp
          newTagFrom: image.tag
environments:
  staging:
    overrides:
      deploy:
        kubernetes:
          namespace: staging
"#;

fn rollout(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rollout"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run rollout")
}

fn project(config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rollout.yaml"), config).unwrap();
    dir
}

#[test]
fn test_plan_discovers_config() {
    let dir = project(CONFIG);
    let output = rollout(dir.path(), &["plan"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "Phase 1: /git, /prereq\nPhase 2: /image\nPhase 3: /deploy\n"
    );
}

#[test]
fn test_plan_with_skipped_job() {
    let dir = project(CONFIG);
    let output = rollout(
        dir.path(),
        &[
            "plan",
            "--skip",
            "image",
            "--skipped-jobs-outputs",
            r#"{"image": {"tag": "v1"}}"#,
        ],
    );

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Phase 1: /image, /prereq\nPhase 2: /deploy\n"
    );
}

#[test]
fn test_skip_count_mismatch_fails() {
    let dir = project(CONFIG);
    let output = rollout(dir.path(), &["plan", "--skip", "image,prereq", "--skipped-jobs-outputs", "{}"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("the number of skipped jobs (2) doesn't match the number of skipped jobs outputs (0)"));
}

#[test]
fn test_validate_reports_counts() {
    let dir = project(CONFIG);
    let config = dir.path().join("rollout.yaml");
    let output = rollout(
        Path::new("/"),
        &["validate", "--config", config.to_str().unwrap(), "--env", "staging"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration valid"));
    assert!(stdout.contains("Environment: staging"));
    assert!(stdout.contains("Jobs: 4 (0 groups)"));
    assert!(stdout.contains("Phases: 3"));
}

#[test]
fn test_unknown_environment_fails() {
    let dir = project(CONFIG);
    let output = rollout(dir.path(), &["validate", "-e", "prod"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("prod"));
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = rollout(dir.path(), &["plan"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to find a configuration file"));
}
