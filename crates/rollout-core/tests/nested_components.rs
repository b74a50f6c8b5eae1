//! End-to-end tests for nested component trees, skipped groups and
//! externals read from a local terraform state

use rollout_config::parser;
use rollout_core::testing::RecordingRuntime;
use rollout_core::{Interpreter, JobId, JobStatus, LoadOptions, Outputs, RunOptions, Workflow};
use std::path::Path;

const NESTED: &str = r#"
dir: /work
components:
  infra:
    dir: infra
    components:
      vpc:
        dir: vpc
        terraform: {}
      cluster:
        needs: [vpc]
        dir: cluster
        terraform:
          vars:
            - name: vpc
              valueFrom: vpc.vpc_id
  app:
    needs: [infra/cluster]
    noop: {}
"#;

const VPC_OUTPUTS: &str = r#"{"vpc_id": {"type": "string", "value": "vpc-1"}}"#;

#[smol_potat::test]
async fn test_nested_siblings_resolve_within_their_group() {
    let config = parser::parse_str(NESTED).unwrap();
    let workflow = Workflow::load(&config, &LoadOptions::default()).unwrap();

    let cluster = workflow.job("/infra/cluster").unwrap();
    assert_eq!(cluster.needs, [JobId::new("/infra/vpc")]);
    assert_eq!(cluster.dir, Path::new("/work/infra/cluster"));
    assert_eq!(workflow.job("app").unwrap().needs, [JobId::new("/infra/cluster")]);
    assert_eq!(
        workflow.dependencies[&JobId::new("/infra/cluster")],
        [JobId::new("/infra/vpc")]
    );

    let runtime = RecordingRuntime::new();
    runtime.respond("terraform output -json", VPC_OUTPUTS);
    let interpreter = Interpreter::new(&workflow, &runtime, RunOptions::default());
    let report = interpreter.apply().await.unwrap();

    assert_eq!(report.get("/infra/vpc").unwrap()["vpc_id"], "vpc-1");
    assert_eq!(interpreter.status("/app"), Some(JobStatus::Completed));
    let applied = runtime
        .commands()
        .into_iter()
        .find(|command| command.to_string().ends_with("-var vpc=vpc-1"))
        .expect("cluster apply with the vpc id");
    assert_eq!(
        applied.to_string(),
        "terraform apply -input=false -auto-approve -var vpc=vpc-1"
    );
    assert_eq!(
        applied.get_current_dir(),
        Some(Path::new("/work/infra/cluster"))
    );
}

const SKIPPED_GROUP: &str = r#"
components:
  app:
    components:
      web:
        noop: {}
  release:
    needs: [app]
    terraform:
      vars:
        - name: x
          valueFrom: app.x
"#;

#[smol_potat::test]
async fn test_skipped_group_supplies_outputs() {
    let config = parser::parse_str(SKIPPED_GROUP).unwrap();
    let mut options = LoadOptions {
        skip: vec!["app".to_string()],
        ..Default::default()
    };
    options
        .skipped_jobs_outputs
        .insert("app".to_string(), Outputs::from([("x".to_string(), "1".to_string())]));
    let workflow = Workflow::load(&config, &options).unwrap();
    assert!(workflow.plan[0].contains(&JobId::new("/app")));

    let runtime = RecordingRuntime::new();
    runtime.respond("terraform output -json", "{}");
    let interpreter = Interpreter::new(&workflow, &runtime, RunOptions::default());
    let report = interpreter.diff().await.unwrap();

    assert_eq!(interpreter.status("app"), Some(JobStatus::Skipped));
    assert_eq!(report.get("app").unwrap()["x"], "1");
    assert!(
        runtime
            .command_lines()
            .contains(&"terraform plan -input=false -var x=1".to_string())
    );
}

#[smol_potat::test]
async fn test_externals_read_local_state() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("state")).unwrap();
    std::fs::write(
        dir.path().join("state/terraform.tfstate"),
        r#"{"version": 4, "outputs": {"vpc_id": {"value": "vpc-9", "type": "string"}}}"#,
    )
    .unwrap();

    let config = parser::parse_str(&format!(
        r#"
dir: {}
components:
  network:
    externals:
      outputs:
        vpc_id:
          terraformState:
            path: state/terraform.tfstate
            expr: output.vpc_id
  cluster:
    needs: [network]
    terraform:
      vars:
        - name: vpc
          valueFrom: network.vpc_id
"#,
        dir.path().display()
    ))
    .unwrap();
    let workflow = Workflow::load(&config, &LoadOptions::default()).unwrap();

    let runtime = RecordingRuntime::new();
    runtime.respond("terraform output -json", "{}");
    let interpreter = Interpreter::new(&workflow, &runtime, RunOptions::default());
    let report = interpreter.diff().await.unwrap();

    assert_eq!(report.get("network").unwrap()["vpc_id"], "vpc-9");
    let lines = runtime.command_lines();
    assert!(lines.contains(&"terraform plan -input=false -var vpc=vpc-9".to_string()));
    assert!(!lines.iter().any(|line| line.starts_with("aws") || line.starts_with("gsutil")));
}

#[smol_potat::test]
async fn test_externals_missing_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = parser::parse_str(&format!(
        r#"
dir: {}
components:
  network:
    externals:
      outputs:
        vpc_id:
          terraformState:
            path: missing.tfstate
            expr: output.vpc_id
"#,
        dir.path().display()
    ))
    .unwrap();
    let workflow = Workflow::load(&config, &LoadOptions::default()).unwrap();

    let runtime = RecordingRuntime::new();
    let interpreter = Interpreter::new(&workflow, &runtime, RunOptions::default());
    let err = interpreter.diff().await.unwrap_err();

    assert!(err.to_string().contains("external output \"vpc_id\""));
    assert_eq!(interpreter.status("network"), Some(JobStatus::Failed));
    assert!(runtime.commands().is_empty());
}
