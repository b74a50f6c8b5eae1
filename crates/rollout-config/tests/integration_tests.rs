//! Integration tests for rollout-config

use rollout_config::{ConfigError, DriverConfig, environment, parser};
use std::fs;

const CONFIG: &str = r#"
components:
  prereq:
    aws:
      account: "12345"
  image:
    needs: [git, prereq]
    docker:
      image: myaccount.dkr.ecr.ap-northeast-1.amazonaws.com/myapp
      file: Dockerfile
      args:
        GO_VERSION: "1.22"
      argsFrom:
        COMMIT: git.sha
      tagsFrom: [git.sha]
  deploy:
    needs: [image]
    dir: k8s
    kubernetes:
      path: overlays/dev
      kustomize: true
      namespace: myapp
      images:
        - name: myapp
          newName: myaccount.dkr.ecr.ap-northeast-1.amazonaws.com/myapp
          newTagFrom: image.tag
  infra:
    terraform:
      target: module.vpc
      vars:
        - name: region
          value: ap-northeast-1
        - name: image_id
          valueFrom: image.id
  secrets:
    externals:
      outputs:
        db_password:
          awsSecret:
            id: myapp/db
            path: password
        vpc_id:
          terraformState:
            path: terraform/terraform.tfstate
            expr: output.vpc_id
environments:
  prod:
    overrides:
      deploy:
        kubernetes:
          path: overlays/prod
    uses:
      prereq:
        aws:
          account: "67890"
"#;

#[test]
fn test_full_config_parsing() {
    let config = parser::parse_str(CONFIG).unwrap();
    parser::validate_config(&config).unwrap();

    assert_eq!(config.components.len(), 5);

    let image = &config.components["image"];
    assert_eq!(image.needs, ["git", "prereq"]);
    let docker = image.docker.as_ref().unwrap();
    assert_eq!(docker.args["GO_VERSION"], "1.22");
    assert_eq!(docker.args_from["COMMIT"], "git.sha");
    assert_eq!(docker.tags_from, ["git.sha"]);

    let deploy = &config.components["deploy"];
    assert_eq!(deploy.dir, "k8s");
    let kubernetes = deploy.kubernetes.as_ref().unwrap();
    assert!(kubernetes.kustomize);
    assert_eq!(kubernetes.images[0].new_tag_from, "image.tag");

    match config.components["infra"].driver().unwrap() {
        Some(DriverConfig::Terraform(terraform)) => {
            assert_eq!(terraform.target, "module.vpc");
            assert_eq!(terraform.vars[1].value_from, "image.id");
        }
        other => panic!("unexpected driver: {:?}", other),
    }

    let externals = config.components["secrets"].externals.as_ref().unwrap();
    let secret = externals.outputs["db_password"].aws_secret.as_ref().unwrap();
    assert_eq!(secret.id, "myapp/db");
    assert_eq!(secret.path, "password");
}

#[test]
fn test_environment_resolution() {
    let config = parser::parse_str(CONFIG).unwrap();
    let prod = environment::resolve(&config, Some("prod")).unwrap();

    let kubernetes = prod.components["deploy"].kubernetes.as_ref().unwrap();
    assert_eq!(kubernetes.path, "overlays/prod");
    assert_eq!(kubernetes.namespace, "myapp");
    assert_eq!(prod.components["deploy"].needs, ["image"]);

    let aws = prod.components["prereq"].aws.as_ref().unwrap();
    assert_eq!(aws.account, "67890");

    let err = environment::resolve(&config, Some("dev")).unwrap_err();
    assert!(matches!(err, ConfigError::EnvironmentNotFound(_)));
}

#[test]
fn test_nested_environment() {
    let config = parser::parse_str(
        r#"
components:
  app:
    components:
      web:
        noop: {}
    environments:
      staging:
        uses:
          web:
            docker:
              image: web
"#,
    )
    .unwrap();

    let staging = environment::resolve(&config, Some("staging")).unwrap();
    let web = &staging.components["app"].components["web"];
    assert_eq!(web.driver_kinds(), ["docker"]);
}

#[test]
fn test_parse_file_defaults_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollout.yaml");
    fs::write(&path, CONFIG).unwrap();

    let config = parser::parse_file(&path).unwrap();
    assert_eq!(config.dir, dir.path().display().to_string());
}

#[test]
fn test_parse_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollout.json");
    fs::write(
        &path,
        r#"{"dir": "/srv/app", "components": {"noop": {"noop": {}}}}"#,
    )
    .unwrap();

    let config = parser::parse_file(&path).unwrap();
    assert_eq!(config.dir, "/srv/app");
    assert_eq!(config.components["noop"].driver_kinds(), ["noop"]);
}

#[test]
fn test_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollout.toml");
    fs::write(&path, "").unwrap();

    let err = parser::parse_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn test_discover() {
    let dir = tempfile::tempdir().unwrap();

    let err = parser::discover(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));

    fs::write(dir.path().join("rollout.yml"), CONFIG).unwrap();
    assert_eq!(
        parser::discover(dir.path()).unwrap(),
        dir.path().join("rollout.yml")
    );

    fs::write(dir.path().join("rollout.json"), "{}").unwrap();
    let err = parser::discover(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Ambiguous(_)));
}
